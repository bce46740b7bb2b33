use std::{cell::Cell, rc::Rc};

use parse_display::Display;

use crate::{
    DeadLetterEntry, DeadLetterStore, Entity, EntityCollection, Gateway, GatewayError, Ledger,
    Notifier, PendingChange, RequestEntity, RequestLog, Spawner, Subscription,
};


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[display(style = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Draining,
}

/// Sends the changes in a [`Ledger`] to a [`Gateway`] one at a time, in FIFO order.
///
/// A successful response is applied to the [`EntityCollection`].
/// A failed response is moved to the [`DeadLetterStore`],
/// together with a log entry; the changes queued behind it are still sent.
pub struct Coordinator<T: Entity> {
    name: String,
    notifier: Rc<Notifier>,
    gateway: Rc<dyn Gateway<T>>,
    ledger: Ledger<T>,
    entities: EntityCollection<T>,
    dead_letters: DeadLetterStore<T>,
    requests: Option<RequestLog>,
    state: Cell<CoordinatorState>,
    is_scheduled: Cell<bool>,
}

impl<T: Entity> Coordinator<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        notifier: Rc<Notifier>,
        gateway: Rc<dyn Gateway<T>>,
        ledger: Ledger<T>,
        entities: EntityCollection<T>,
        dead_letters: DeadLetterStore<T>,
        requests: Option<RequestLog>,
    ) -> Rc<Self> {
        Rc::new(Self {
            name,
            notifier,
            gateway,
            ledger,
            entities,
            dead_letters,
            requests,
            state: Cell::new(CoordinatorState::Idle),
            is_scheduled: Cell::new(false),
        })
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.get()
    }

    /// Starts draining on `spawner` each time a change is queued while idle.
    ///
    /// Draining stops when the returned [`Subscription`] is dropped.
    pub(crate) fn auto_drain(self: &Rc<Self>, spawner: Spawner) -> Subscription {
        self.schedule(&spawner);
        let this = Rc::downgrade(self);
        self.notifier.subscribe(move || {
            if let Some(this) = this.upgrade() {
                this.schedule(&spawner);
            }
        })
    }
    fn schedule(self: &Rc<Self>, spawner: &Spawner) {
        if self.state.get() == CoordinatorState::Idle
            && !self.is_scheduled.get()
            && !self.ledger.is_empty()
        {
            self.is_scheduled.set(true);
            spawner.spawn(self.clone().drain());
        }
    }

    /// Sends queued changes until the ledger is empty.
    ///
    /// The state is [`Draining`](CoordinatorState::Draining) while a request is outstanding.
    ///
    /// Returns immediately if another call is already draining.
    pub async fn drain(self: Rc<Self>) {
        self.is_scheduled.set(false);
        if self.state.get() == CoordinatorState::Draining {
            return;
        }
        while let Some(change) = self.begin() {
            let request = self.requests.as_ref().map(|log| {
                let request = RequestEntity::new(&self.name, &change);
                let id = request.id.clone();
                log.request_sent(request);
                id
            });
            let result = self.send(&change).await;
            if let (Some(log), Some(id)) = (&self.requests, &request) {
                match &result {
                    Ok(_) => log.response_received(id),
                    Err(_) => log.response_error(id),
                };
            }
            self.finish(change, result);
        }
    }

    fn begin(&self) -> Option<PendingChange<T>> {
        self.state.set(CoordinatorState::Draining);
        let Some(change) = self.ledger.dequeue_next() else {
            self.state.set(CoordinatorState::Idle);
            return None;
        };
        tracing::debug!(name = %self.name, kind = %change.kind(), id = %change.target_id(), "sending change");
        Some(change)
    }

    async fn send(&self, change: &PendingChange<T>) -> Result<Option<T>, GatewayError> {
        match change {
            PendingChange::Add { draft, .. } => self.gateway.create(draft).await.map(Some),
            PendingChange::Update { entity } => self.gateway.update(entity).await.map(Some),
            PendingChange::Delete { entity } => self.gateway.delete(entity.id()).await.map(|_| None),
        }
    }

    fn finish(&self, change: PendingChange<T>, result: Result<Option<T>, GatewayError>) {
        self.notifier.batch(|| {
            match result {
                Ok(confirmed) => self.apply(&change, confirmed),
                Err(error) => self.reject(change, error),
            }
            self.ledger.settle();
        });
        self.state.set(CoordinatorState::Idle);
    }

    fn apply(&self, change: &PendingChange<T>, confirmed: Option<T>) {
        tracing::debug!(name = %self.name, kind = %change.kind(), id = %change.target_id(), "change confirmed");
        match (change, confirmed) {
            (PendingChange::Add { temp_id, .. }, Some(entity)) => {
                let id = entity.id().to_owned();
                self.entities.upsert(entity);
                self.ledger.rebind(temp_id, &id);
            }
            (PendingChange::Update { .. }, Some(entity)) => self.entities.upsert(entity),
            (PendingChange::Delete { entity }, _) => {
                self.entities.remove(entity.id());
            }
            (_, None) => {}
        }
    }

    fn reject(&self, change: PendingChange<T>, error: GatewayError) {
        let entry = DeadLetterEntry::new(change, error);
        tracing::warn!(name = %self.name, error = %entry.error, "{}", entry.message);
        if let PendingChange::Add { temp_id, .. } = &entry.body {
            for dropped in self.ledger.discard_target(temp_id) {
                tracing::warn!(
                    name = %self.name,
                    kind = %dropped.kind(),
                    id = %temp_id,
                    "discarded change to an entity that was not created"
                );
            }
        }
        self.dead_letters.push(entry);
    }
}

impl<T: Entity> std::fmt::Debug for Coordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}
