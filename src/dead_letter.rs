use std::{cell::Ref, rc::Rc};

use chrono::{DateTime, Utc};
use derive_ex::derive_ex;
use serde::{Deserialize, Serialize};

use crate::{notify::Store, ChangeKind, Entity, GatewayError, Notifier, PendingChange};


/// A change the server rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct DeadLetterEntry<T: Entity> {
    pub id: String,
    pub body: PendingChange<T>,
    pub error: GatewayError,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl<T: Entity> DeadLetterEntry<T> {
    pub fn new(body: PendingChange<T>, error: GatewayError) -> Self {
        let message = format!(
            "could not {} `{}`: {error}",
            body.kind(),
            body.target_id()
        );
        Self {
            id: crate::utils::new_id(),
            body,
            error,
            message,
            timestamp: Utc::now(),
        }
    }
    pub fn kind(&self) -> ChangeKind {
        self.body.kind()
    }
    pub fn target_id(&self) -> &str {
        self.body.target_id()
    }
}

/// Failed changes of one feature, in the order they failed.
///
/// Entries stay until they are dismissed or retried.
#[derive_ex(Clone, bound())]
pub struct DeadLetterStore<T: Entity>(Store<Vec<DeadLetterEntry<T>>>);

impl<T: Entity> DeadLetterStore<T> {
    pub fn new(notifier: &Rc<Notifier>) -> Self {
        Self(Store::new(Vec::new(), notifier))
    }

    pub(crate) fn push(&self, entry: DeadLetterEntry<T>) {
        self.0.borrow_mut().push(entry);
    }

    /// Removes the entry with the given id and returns it.
    pub fn dismiss(&self, id: &str) -> Option<DeadLetterEntry<T>> {
        let index = self.0.borrow().iter().position(|e| e.id == id)?;
        Some(self.0.borrow_mut().remove(index))
    }

    pub fn get(&self, id: &str) -> Option<DeadLetterEntry<T>> {
        self.0.borrow().iter().find(|e| e.id == id).cloned()
    }

    pub(crate) fn clear(&self) {
        if !self.is_empty() {
            self.0.borrow_mut().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
    pub fn borrow(&self) -> Ref<'_, [DeadLetterEntry<T>]> {
        Ref::map(self.0.borrow(), |v| v.as_slice())
    }
}

impl<T: Entity> std::fmt::Debug for DeadLetterStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.borrow().iter()).finish()
    }
}
