use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{parse2, spanned::Spanned, Data, DeriveInput, Field, Fields, Ident, Result};

use crate::syn_utils::is_attr;

pub fn derive_entity(input: TokenStream) -> Result<TokenStream> {
    let input: DeriveInput = parse2(input)?;
    if !input.generics.params.is_empty() {
        bail!(
            input.generics.span(),
            "`#[derive(Entity)]` does not support generic types"
        );
    }
    let Data::Struct(data) = &input.data else {
        bail!(input.ident.span(), "`#[derive(Entity)]` supports only structs");
    };
    let Fields::Named(fields) = &data.fields else {
        bail!(
            input.ident.span(),
            "`#[derive(Entity)]` supports only structs with named fields"
        );
    };

    let draft = parse_struct_args(&input)?.unwrap_or_else(|| format_ident!("{}Draft", input.ident));
    let id_field = find_id_field(fields.named.iter(), &input.ident)?;

    let vis = &input.vis;
    let ident = &input.ident;
    let mut draft_fields = Vec::new();
    let mut draft_idents = Vec::new();
    for field in &fields.named {
        if field.ident == id_field.ident {
            continue;
        }
        let attrs = field.attrs.iter().filter(|a| !is_attr(a, "entity"));
        let field_vis = &field.vis;
        let field_ident = &field.ident;
        let ty = &field.ty;
        draft_fields.push(quote!(#(#attrs)* #field_vis #field_ident: #ty));
        draft_idents.push(field_ident);
    }
    let id_ident = &id_field.ident;
    let doc = format!("[`{ident}`] without its id.");

    Ok(quote! {
        #[doc = #doc]
        #[derive(
            ::core::clone::Clone,
            ::core::fmt::Debug,
            ::core::cmp::PartialEq,
            ::entity_outbox::__private::serde::Serialize,
            ::entity_outbox::__private::serde::Deserialize,
        )]
        #[serde(crate = "::entity_outbox::__private::serde")]
        #vis struct #draft {
            #(#draft_fields,)*
        }

        #[automatically_derived]
        impl ::entity_outbox::Entity for #ident {
            type Draft = #draft;

            fn id(&self) -> &str {
                ::core::convert::AsRef::<str>::as_ref(&self.#id_ident)
            }
            fn set_id(&mut self, id: ::std::string::String) {
                self.#id_ident = ::core::convert::From::from(id);
            }
            fn from_draft(id: ::std::string::String, draft: Self::Draft) -> Self {
                Self {
                    #id_ident: ::core::convert::From::from(id),
                    #(#draft_idents: draft.#draft_idents,)*
                }
            }
        }
    })
}

fn parse_struct_args(input: &DeriveInput) -> Result<Option<Ident>> {
    let mut draft = None;
    for attr in input.attrs.iter().filter(|a| is_attr(a, "entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("draft") {
                draft = Some(meta.value()?.parse::<Ident>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported `entity` attribute, expected `draft = Ident`"))
            }
        })?;
    }
    Ok(draft)
}

fn find_id_field<'a>(fields: impl Iterator<Item = &'a Field>, ident: &Ident) -> Result<&'a Field> {
    let mut marked = None;
    let mut named = None;
    for field in fields {
        for attr in field.attrs.iter().filter(|a| is_attr(a, "entity")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    Ok(())
                } else {
                    Err(meta.error("unsupported `entity` attribute, expected `id`"))
                }
            })?;
            if marked.is_some() {
                bail!(attr.span(), "`#[entity(id)]` is specified more than once");
            }
            marked = Some(field);
        }
        if field.ident.as_ref().is_some_and(|i| i == "id") {
            named = Some(field);
        }
    }
    match marked.or(named) {
        Some(field) => Ok(field),
        None => bail!(
            ident.span(),
            "`{ident}` has no field named `id`; mark the id field with `#[entity(id)]`"
        ),
    }
}
