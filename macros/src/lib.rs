use proc_macro::TokenStream;
use syn_utils::into_macro_output;

#[macro_use]
mod syn_utils;

mod entity_impl;

/// Implements `Entity` for a struct with named fields and generates its draft type.
///
/// The draft type holds every field except the id, and is what a pending addition
/// carries before the server assigns an id.
///
/// # Attributes
///
/// | Attribute                      | Position | Meaning                                           |
/// |--------------------------------|----------|---------------------------------------------------|
/// | `#[entity(draft = NewProduct)]`| struct   | name of the generated draft type (default `{Name}Draft`) |
/// | `#[entity(id)]`                | field    | field holding the id (default: the field named `id`) |
///
/// # Examples
///
/// ```ignore
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
/// #[entity(draft = NewProduct)]
/// struct Product {
///     id: String,
///     name: String,
///     price: u32,
/// }
///
/// let draft = NewProduct { name: "Gizmo".into(), price: 5 };
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    into_macro_output(entity_impl::derive_entity(input.into()))
}
