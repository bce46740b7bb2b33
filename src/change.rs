use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

use crate::{Entity, EntityMeta};

/// Kind of a pending change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn method(self) -> HttpMethod {
        match self {
            ChangeKind::Add => HttpMethod::Post,
            ChangeKind::Update => HttpMethod::Put,
            ChangeKind::Delete => HttpMethod::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize)]
#[display(style = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// A mutation that has not been confirmed by the server yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", bound = "")]
pub enum PendingChange<T: Entity> {
    /// An entity to be created. `temp_id` identifies the provisional row until the server assigns an id.
    Add { temp_id: String, draft: T::Draft },
    Update { entity: T },
    Delete { entity: T },
}

impl<T: Entity> PendingChange<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            PendingChange::Add { .. } => ChangeKind::Add,
            PendingChange::Update { .. } => ChangeKind::Update,
            PendingChange::Delete { .. } => ChangeKind::Delete,
        }
    }
    pub fn method(&self) -> HttpMethod {
        self.kind().method()
    }

    /// The id this change applies to: the temporary id for additions, the entity id otherwise.
    pub fn target_id(&self) -> &str {
        match self {
            PendingChange::Add { temp_id, .. } => temp_id,
            PendingChange::Update { entity } | PendingChange::Delete { entity } => entity.id(),
        }
    }
    pub fn entity(&self) -> Option<&T> {
        match self {
            PendingChange::Add { .. } => None,
            PendingChange::Update { entity } | PendingChange::Delete { entity } => Some(entity),
        }
    }
    pub fn is_add(&self) -> bool {
        matches!(self, PendingChange::Add { .. })
    }
}

/// A pending addition shown as a provisional row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Provisional<T: Entity> {
    pub temp_id: String,
    pub draft: T::Draft,
    /// Changes queued against the row while its addition is in flight.
    pub meta: EntityMeta<T>,
}

impl<T: Entity> Provisional<T> {
    pub fn from_change(change: &PendingChange<T>) -> Option<Self> {
        match change {
            PendingChange::Add { temp_id, draft } => Some(Self {
                temp_id: temp_id.clone(),
                draft: draft.clone(),
                meta: EntityMeta::default(),
            }),
            _ => None,
        }
    }
}
