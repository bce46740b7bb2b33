use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use derive_ex::derive_ex;
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

use crate::{ChangeKind, DeadLetterEntry, Entity, PendingChange, Provisional};


#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize,
)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Order of the entities in an [`AugmentedView`].
#[derive_ex(Clone, bound())]
pub struct Sorting<T> {
    compare: Option<Rc<dyn Fn(&T, &T) -> Ordering>>,
    direction: SortDirection,
}

impl<T> Sorting<T> {
    /// Keeps the order of the canonical collection.
    pub fn unsorted() -> Self {
        Self {
            compare: None,
            direction: SortDirection::Asc,
        }
    }
    pub fn by(compare: impl Fn(&T, &T) -> Ordering + 'static, direction: SortDirection) -> Self {
        Self {
            compare: Some(Rc::new(compare)),
            direction,
        }
    }
    pub fn by_key<K: Ord>(key: impl Fn(&T) -> K + 'static, direction: SortDirection) -> Self {
        Self::by(move |a, b| key(a).cmp(&key(b)), direction)
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }
    pub fn with_direction(self, direction: SortDirection) -> Self {
        Self { direction, ..self }
    }
    pub fn toggled(self) -> Self {
        let direction = self.direction.toggled();
        self.with_direction(direction)
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        let Some(compare) = &self.compare else {
            return Ordering::Equal;
        };
        match self.direction {
            SortDirection::Asc => compare(a, b),
            SortDirection::Desc => compare(b, a),
        }
    }
}

impl<T> Default for Sorting<T> {
    fn default() -> Self {
        Self::unsorted()
    }
}

impl<T> std::fmt::Debug for Sorting<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sorting")
            .field("is_sorted", &self.compare.is_some())
            .field("direction", &self.direction)
            .finish()
    }
}

/// A failed update or deletion of an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityError {
    /// Id of the dead-letter entry.
    pub error_id: String,
    pub kind: ChangeKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct EntityMeta<T: Entity> {
    pub is_deleting: bool,
    pub is_updating: bool,
    pub is_mutating: bool,
    /// The latest pending update of the entity.
    pub update: Option<T>,
    pub errors: Vec<EntityError>,
}

impl<T: Entity> Default for EntityMeta<T> {
    fn default() -> Self {
        Self {
            is_deleting: false,
            is_updating: false,
            is_mutating: false,
            update: None,
            errors: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AugmentedEntity<T: Entity> {
    pub item: T,
    pub meta: EntityMeta<T>,
}

impl<T: Entity> AugmentedEntity<T> {
    /// Returns the pending update if any, otherwise the confirmed entity.
    pub fn current(&self) -> &T {
        self.meta.update.as_ref().unwrap_or(&self.item)
    }
}

/// The collection as the UI should render it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct AugmentedView<T: Entity> {
    pub data: Vec<AugmentedEntity<T>>,
    pub is_loading: bool,
    pub is_adding: bool,
    pub additions: Vec<Provisional<T>>,
    pub addition_errors: Vec<DeadLetterEntry<T>>,
}

impl<T: Entity> AugmentedView<T> {
    pub fn get(&self, id: &str) -> Option<&AugmentedEntity<T>> {
        self.data.iter().find(|e| e.item.id() == id)
    }
}

impl<T: Entity> Default for AugmentedView<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            is_loading: false,
            is_adding: false,
            additions: Vec::new(),
            addition_errors: Vec::new(),
        }
    }
}

/// Combines the canonical entities, the pending changes and the dead letters into an [`AugmentedView`].
///
/// `changes` must be in ledger order (in-flight change first).
/// The result depends only on the arguments.
pub fn project<'a, T: Entity>(
    entities: &[T],
    changes: impl IntoIterator<Item = &'a PendingChange<T>>,
    dead_letters: &[DeadLetterEntry<T>],
    sorting: &Sorting<T>,
    is_loading: bool,
) -> AugmentedView<T> {
    let mut deleting = HashSet::new();
    let mut updates = HashMap::new();
    let mut additions = Vec::new();
    for change in changes {
        match change {
            PendingChange::Add { .. } => additions.extend(Provisional::from_change(change)),
            PendingChange::Update { entity } => {
                updates.insert(entity.id(), entity);
            }
            PendingChange::Delete { entity } => {
                deleting.insert(entity.id());
            }
        }
    }

    let mut errors: HashMap<&str, Vec<EntityError>> = HashMap::new();
    let mut addition_errors = Vec::new();
    for entry in dead_letters {
        match entry.kind() {
            ChangeKind::Add => addition_errors.push(entry.clone()),
            kind => errors
                .entry(entry.target_id())
                .or_default()
                .push(EntityError {
                    error_id: entry.id.clone(),
                    kind,
                    message: entry.message.clone(),
                }),
        }
    }

    let meta = |id: &str, errors: Vec<EntityError>| {
        let is_deleting = deleting.contains(id);
        let update = updates.get(id).map(|&e| e.clone());
        let is_updating = update.is_some();
        EntityMeta {
            is_deleting,
            is_updating,
            is_mutating: is_deleting || is_updating,
            update,
            errors,
        }
    };

    let mut items: Vec<&T> = entities.iter().collect();
    items.sort_by(|a, b| sorting.compare(a, b));
    let data = items
        .into_iter()
        .map(|item| AugmentedEntity {
            item: item.clone(),
            meta: meta(item.id(), errors.remove(item.id()).unwrap_or_default()),
        })
        .collect();
    for addition in &mut additions {
        addition.meta = meta(&addition.temp_id, Vec::new());
    }

    AugmentedView {
        data,
        is_loading,
        is_adding: !additions.is_empty(),
        additions,
        addition_errors,
    }
}
