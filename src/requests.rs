use std::cell::Ref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{notify::Store, ChangeKind, Entity, HttpMethod, Notifier, PendingChange, Subscription};

/// A request sent by an outbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestEntity {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub method: HttpMethod,
    pub kind: ChangeKind,
    /// The draft of an addition, the entity of an update, or the id of a deletion.
    pub body: serde_json::Value,
    /// Name of the feature that sent the request.
    pub name: String,
}

impl RequestEntity {
    pub fn new<T: Entity>(name: &str, change: &PendingChange<T>) -> Self {
        let body = match change {
            PendingChange::Add { draft, .. } => serde_json::to_value(draft),
            PendingChange::Update { entity } => serde_json::to_value(entity),
            PendingChange::Delete { entity } => Ok(entity.id().into()),
        };
        let body = body.unwrap_or_else(|e| {
            tracing::warn!(name, error = %e, "failed to serialize request body");
            serde_json::Value::Null
        });
        Self {
            id: crate::utils::new_id(),
            timestamp: Utc::now(),
            method: change.method(),
            kind: change.kind(),
            body,
            name: name.into(),
        }
    }
}

/// Requests that have been sent and not answered yet, shared by every outbox.
#[derive(Clone)]
pub struct RequestLog(Store<Vec<RequestEntity>>);

impl RequestLog {
    pub fn new() -> Self {
        Self(Store::new(Vec::new(), &Notifier::new()))
    }

    pub fn subscribe(&self, f: impl FnMut() + 'static) -> Subscription {
        self.0.notifier().subscribe(f)
    }

    pub fn request_sent(&self, request: RequestEntity) {
        tracing::debug!(name = %request.name, kind = %request.kind, id = %request.id, "request sent");
        self.0.borrow_mut().push(request);
    }

    /// Removes a request that got a successful response.
    pub fn response_received(&self, id: &str) -> Option<RequestEntity> {
        self.remove(id)
    }

    /// Removes a request that failed.
    pub fn response_error(&self, id: &str) -> Option<RequestEntity> {
        self.remove(id)
    }

    fn remove(&self, id: &str) -> Option<RequestEntity> {
        let index = self.0.borrow().iter().position(|r| r.id == id)?;
        Some(self.0.borrow_mut().remove(index))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
    pub fn borrow(&self) -> Ref<'_, [RequestEntity]> {
        Ref::map(self.0.borrow(), |v| v.as_slice())
    }

    /// Returns the pending requests of the feature `name`.
    pub fn for_feature(&self, name: &str) -> Vec<RequestEntity> {
        self.0.borrow().iter().filter(|r| r.name == name).cloned().collect()
    }
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.borrow().iter()).finish()
    }
}
