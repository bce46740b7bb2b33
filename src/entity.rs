use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

pub use entity_outbox_macros::Entity;

/// A domain record with a stable unique identifier.
///
/// Use `#[derive(Entity)]` to implement this trait and generate the [`Draft`](Entity::Draft) type.
pub trait Entity: Clone + Debug + PartialEq + Serialize + DeserializeOwned + 'static {
    /// The entity without its id; the payload of a pending addition.
    type Draft: Clone + Debug + PartialEq + Serialize + DeserializeOwned + 'static;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    /// Builds the entity the server would return for `draft` after assigning `id`.
    fn from_draft(id: String, draft: Self::Draft) -> Self;
}
