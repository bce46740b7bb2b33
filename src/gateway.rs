use std::rc::Rc;

use futures::future::LocalBoxFuture;
use parse_display::Display;
use serde::{Deserialize, Serialize};

use crate::Entity;

#[cfg(feature = "http")]
mod http;
mod memory;

#[cfg(feature = "http")]
pub use http::HttpGateway;
pub use memory::MemoryGateway;

/// Failure reported by a [`Gateway`].
///
/// `status` is `0` when the request failed without a response.
#[derive(Clone, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[display("{status_text} ({status})")]
#[serde(rename_all = "camelCase")]
pub struct GatewayError {
    pub status: u16,
    pub status_text: String,
}

impl GatewayError {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
        }
    }
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }
    pub fn is_transport(&self) -> bool {
        self.status == 0
    }
}

impl std::error::Error for GatewayError {}

/// The remote API of one feature.
///
/// Implementations perform exactly one request per call and never retry.
pub trait Gateway<T: Entity> {
    fn list(&self) -> LocalBoxFuture<'_, Result<Vec<T>, GatewayError>>;

    /// Creates an entity; the server assigns its id.
    fn create<'a>(&'a self, draft: &'a T::Draft) -> LocalBoxFuture<'a, Result<T, GatewayError>>;

    /// Replaces an entity and returns the server-confirmed value.
    fn update<'a>(&'a self, entity: &'a T) -> LocalBoxFuture<'a, Result<T, GatewayError>>;

    fn delete<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<(), GatewayError>>;
}

impl<T: Entity, G: Gateway<T> + ?Sized> Gateway<T> for Rc<G> {
    fn list(&self) -> LocalBoxFuture<'_, Result<Vec<T>, GatewayError>> {
        (**self).list()
    }
    fn create<'a>(&'a self, draft: &'a T::Draft) -> LocalBoxFuture<'a, Result<T, GatewayError>> {
        (**self).create(draft)
    }
    fn update<'a>(&'a self, entity: &'a T) -> LocalBoxFuture<'a, Result<T, GatewayError>> {
        (**self).update(entity)
    }
    fn delete<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<(), GatewayError>> {
        (**self).delete(id)
    }
}
