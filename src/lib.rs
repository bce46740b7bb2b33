//! Optimistic client-side state for collections of entities kept on a remote server.
//!
//! Each feature (such as "products") owns an [`Outbox`]:
//!
//! - Mutations are queued in a [`Ledger`] and shown immediately in the [`AugmentedView`].
//! - A [`Coordinator`] sends them to a [`Gateway`] one at a time, in order.
//! - Confirmed results update the [`EntityCollection`]; failures go to the [`DeadLetterStore`].

extern crate self as entity_outbox;

mod change;
mod collection;
mod config;
mod coordinator;
mod dead_letter;
mod entity;
pub mod gateway;
mod ledger;
mod notify;
mod outbox;
mod projector;
mod requests;
mod spawn;
mod subscription;
mod utils;

pub use change::*;
pub use collection::*;
pub use config::*;
pub use coordinator::*;
pub use dead_letter::*;
pub use entity::*;
pub use gateway::{Gateway, GatewayError, MemoryGateway};
pub use ledger::*;
pub use notify::{Notifier, Store, StoreRefMut};
pub use outbox::*;
pub use projector::*;
pub use requests::*;
pub use spawn::*;
pub use subscription::*;

#[cfg(feature = "http")]
pub use gateway::HttpGateway;

#[doc(hidden)]
pub mod __private {
    pub use serde;
}
