use std::{future::Future, rc::Rc};

use derive_ex::derive_ex;

use crate::{
    notify::Store, project, AugmentedView, Coordinator, CoordinatorState, DeadLetterEntry,
    DeadLetterStore, Deletion, Entity, EntityCollection, Gateway, GatewayError, Ledger, Notifier,
    PendingChange, Provisional, RequestLog, Sorting, Spawner, Subscription,
};

/// Optimistic state of one feature.
///
/// Changes are queued locally and reflected in [`view`](Self::view) immediately,
/// then sent to the [`Gateway`] one at a time.
///
/// ```
/// use entity_outbox::{Entity, MemoryGateway, Outbox};
/// use futures::executor::block_on;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
/// struct Product {
///     id: String,
///     name: String,
/// }
///
/// let outbox = Outbox::<Product>::builder("products", MemoryGateway::default()).build();
/// let temp_id = outbox.add(ProductDraft { name: "apple".into() });
/// assert_eq!(outbox.view().additions[0].temp_id, temp_id);
///
/// block_on(outbox.drain());
/// let view = outbox.view();
/// assert!(view.additions.is_empty());
/// assert_eq!(view.data[0].item.name, "apple");
/// ```
#[derive_ex(Clone, bound())]
pub struct Outbox<T: Entity>(Rc<OutboxNode<T>>);

struct OutboxNode<T: Entity> {
    name: String,
    notifier: Rc<Notifier>,
    gateway: Rc<dyn Gateway<T>>,
    ledger: Ledger<T>,
    entities: EntityCollection<T>,
    dead_letters: DeadLetterStore<T>,
    sorting: Store<Sorting<T>>,
    coordinator: Rc<Coordinator<T>>,
    _auto_drain: Subscription,
}

impl<T: Entity> Outbox<T> {
    pub fn builder(name: impl Into<String>, gateway: impl Gateway<T> + 'static) -> OutboxBuilder<T> {
        OutboxBuilder::new(name, gateway)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the pending changes.
    ///
    /// Entries leave the ledger only when the drain loop sends them.
    ///
    /// ```compile_fail
    /// use entity_outbox::{Entity, MemoryGateway, Outbox};
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
    /// struct Product {
    ///     id: String,
    /// }
    ///
    /// let outbox = Outbox::<Product>::builder("products", MemoryGateway::default()).build();
    /// outbox.ledger().dequeue_next();
    /// ```
    pub fn ledger(&self) -> &Ledger<T> {
        &self.0.ledger
    }
    pub fn entities(&self) -> &EntityCollection<T> {
        &self.0.entities
    }
    pub fn dead_letters(&self) -> &DeadLetterStore<T> {
        &self.0.dead_letters
    }
    pub fn state(&self) -> CoordinatorState {
        self.0.coordinator.state()
    }

    /// Queues an addition under a new temporary id and returns the id.
    pub fn add(&self, draft: T::Draft) -> String {
        let temp_id = crate::utils::new_id();
        self.enqueue_addition(temp_id.clone(), draft);
        temp_id
    }

    /// Queues an addition under `temp_id`.
    ///
    /// # Panics
    ///
    /// Panics if `temp_id` was already used by this outbox.
    pub fn enqueue_addition(&self, temp_id: impl Into<String>, draft: T::Draft) {
        self.0.ledger.enqueue_addition(temp_id, draft);
    }

    /// Queues an update of `entity`.
    ///
    /// The update is dropped if `entity` is a provisional row whose addition was rejected.
    pub fn enqueue_update(&self, entity: T) {
        let id = entity.id().to_owned();
        if !self.0.ledger.enqueue_update(entity) {
            tracing::warn!(name = %self.0.name, kind = "update", id = %id, "dropped change to an entity that was not created");
        }
    }
    pub fn enqueue_deletion(&self, entity: T) -> Deletion<T> {
        let id = entity.id().to_owned();
        let deletion = self.0.ledger.enqueue_deletion(entity);
        if let Deletion::Cancelled(removed) = &deletion {
            tracing::debug!(name = %self.0.name, id = %id, count = removed.len(), "cancelled deletion of provisional row");
        }
        deletion
    }

    /// Deletes a provisional row.
    ///
    /// If its addition has already succeeded, the created entity is deleted.
    pub fn delete_provisional(&self, provisional: &Provisional<T>) -> Deletion<T> {
        let entity = T::from_draft(provisional.temp_id.clone(), provisional.draft.clone());
        self.enqueue_deletion(entity)
    }

    /// Removes a dead letter and queues its change again.
    ///
    /// A retried addition gets a new temporary id, which is returned.
    /// Returns `None` if no dead letter has the given id.
    pub fn retry(&self, dead_letter_id: &str) -> Option<String> {
        self.0.notifier.batch(|| {
            let entry = self.0.dead_letters.dismiss(dead_letter_id)?;
            tracing::info!(name = %self.0.name, kind = %entry.kind(), id = %entry.target_id(), "retrying change");
            Some(match entry.body {
                PendingChange::Add { draft, .. } => self.add(draft),
                PendingChange::Update { entity } => {
                    let id = entity.id().to_owned();
                    self.enqueue_update(entity);
                    id
                }
                PendingChange::Delete { entity } => {
                    let id = entity.id().to_owned();
                    self.enqueue_deletion(entity);
                    id
                }
            })
        })
    }

    pub fn dismiss(&self, dead_letter_id: &str) -> Option<DeadLetterEntry<T>> {
        self.0.dead_letters.dismiss(dead_letter_id)
    }
    /// Removes every dead letter.
    pub fn dismiss_all(&self) {
        self.0.dead_letters.clear();
    }

    pub fn sorting(&self) -> Sorting<T> {
        self.0.sorting.borrow().clone()
    }
    pub fn set_sorting(&self, sorting: Sorting<T>) {
        self.0.sorting.set(sorting);
    }
    /// Reverses the sort direction.
    pub fn toggle_sort_direction(&self) {
        let sorting = self.sorting().toggled();
        self.set_sorting(sorting);
    }

    /// Replaces the canonical entities with the server's list.
    ///
    /// On failure the current entities are kept.
    pub async fn load(&self) -> Result<(), GatewayError> {
        self.0.entities.set_loading(true);
        match self.0.gateway.list().await {
            Ok(items) => {
                tracing::debug!(name = %self.0.name, count = items.len(), "loaded");
                self.0.entities.replace_all(items);
                Ok(())
            }
            Err(e) => {
                tracing::error!(name = %self.0.name, error = %e, "failed to load");
                self.0.entities.set_loading(false);
                Err(e)
            }
        }
    }

    /// Sends queued changes until the ledger is empty.
    ///
    /// Not needed when the outbox was built with a [`Spawner`].
    pub fn drain(&self) -> impl Future<Output = ()> {
        self.0.coordinator.clone().drain()
    }

    pub fn view(&self) -> AugmentedView<T> {
        self.0.view()
    }

    /// Calls `f` each time the view may have changed.
    pub fn subscribe(&self, f: impl FnMut() + 'static) -> Subscription {
        self.0.notifier.subscribe(f)
    }

    /// Calls `f` with the current view, then again each time it changes.
    pub fn watch(&self, mut f: impl FnMut(&AugmentedView<T>) + 'static) -> Subscription {
        f(&self.view());
        let node = Rc::downgrade(&self.0);
        self.subscribe(move || {
            if let Some(node) = node.upgrade() {
                f(&node.view());
            }
        })
    }
}

impl<T: Entity> OutboxNode<T> {
    fn view(&self) -> AugmentedView<T> {
        let entities = self.entities.borrow();
        let ledger = self.ledger.borrow();
        let dead_letters = self.dead_letters.borrow();
        project(
            &entities,
            ledger.iter(),
            &dead_letters,
            &self.sorting.borrow(),
            self.entities.is_loading(),
        )
    }
}

impl<T: Entity> std::fmt::Debug for Outbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("name", &self.0.name)
            .field("state", &self.state())
            .field("ledger", &self.0.ledger)
            .field("entities", &self.0.entities)
            .field("dead_letters", &self.0.dead_letters)
            .finish()
    }
}

/// Builder for [`Outbox`].
pub struct OutboxBuilder<T: Entity> {
    name: String,
    gateway: Rc<dyn Gateway<T>>,
    entities: Vec<T>,
    sorting: Sorting<T>,
    spawner: Option<Spawner>,
    requests: Option<RequestLog>,
}

impl<T: Entity> OutboxBuilder<T> {
    pub fn new(name: impl Into<String>, gateway: impl Gateway<T> + 'static) -> Self {
        Self {
            name: name.into(),
            gateway: Rc::new(gateway),
            entities: Vec::new(),
            sorting: Sorting::unsorted(),
            spawner: None,
            requests: None,
        }
    }

    /// Sets the initial canonical entities.
    pub fn entities(mut self, entities: Vec<T>) -> Self {
        self.entities = entities;
        self
    }
    pub fn sorting(mut self, sorting: Sorting<T>) -> Self {
        self.sorting = sorting;
        self
    }

    /// Sends changes automatically, running the drain loop on `spawner`.
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Records every request in `requests`.
    pub fn request_log(mut self, requests: RequestLog) -> Self {
        self.requests = Some(requests);
        self
    }

    pub fn build(self) -> Outbox<T> {
        let notifier = Notifier::new();
        let ledger = Ledger::new(&notifier);
        let entities = EntityCollection::new(self.entities, &notifier);
        let dead_letters = DeadLetterStore::new(&notifier);
        let sorting = Store::new(self.sorting, &notifier);
        let coordinator = Coordinator::new(
            self.name.clone(),
            notifier.clone(),
            self.gateway.clone(),
            ledger.clone(),
            entities.clone(),
            dead_letters.clone(),
            self.requests,
        );
        let auto_drain = match self.spawner {
            Some(spawner) => coordinator.auto_drain(spawner),
            None => Subscription::empty(),
        };
        Outbox(Rc::new(OutboxNode {
            name: self.name,
            notifier,
            gateway: self.gateway,
            ledger,
            entities,
            dead_letters,
            sorting,
            coordinator,
            _auto_drain: auto_drain,
        }))
    }
}
