use std::{
    cell::Ref,
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use derive_ex::derive_ex;

use crate::{notify::Store, Entity, Notifier, PendingChange};


/// Result of [`Ledger::enqueue_deletion`].
#[derive(Clone, Debug, PartialEq)]
pub enum Deletion<T: Entity> {
    /// A delete was queued.
    Enqueued,
    /// Nothing will be sent.
    ///
    /// Either the entity was a provisional row whose addition had not been sent,
    /// and the addition and the changes queued against it were removed,
    /// or its addition was rejected and the row never existed on the server.
    Cancelled(Vec<PendingChange<T>>),
}

/// The FIFO queue of pending changes of one feature.
///
/// At most one change is in flight at a time.
/// The in-flight change stays visible until [`settle`](Self::settle) is called,
/// so that its entity keeps its in-progress flags while the request is running.
#[derive_ex(Clone, bound())]
pub struct Ledger<T: Entity>(Store<LedgerState<T>>);

struct LedgerState<T: Entity> {
    queue: VecDeque<PendingChange<T>>,
    in_flight: Option<PendingChange<T>>,
    additions: HashMap<String, Addition>,
}

/// What became of the addition behind a temporary id.
enum Addition {
    Pending,
    Created(String),
    Rejected,
}

/// Where a change to an entity should be sent.
enum Target {
    /// The entity id, or a temporary id whose addition has not settled yet.
    Unchanged,
    /// The server id of a created provisional row.
    Created(String),
    /// A provisional row whose addition was rejected.
    Rejected,
}

impl<T: Entity> LedgerState<T> {
    fn target(&self, id: &str) -> Target {
        match self.additions.get(id) {
            Some(Addition::Created(id)) => Target::Created(id.clone()),
            Some(Addition::Rejected) => Target::Rejected,
            Some(Addition::Pending) | None => Target::Unchanged,
        }
    }
}

impl<T: Entity> Ledger<T> {
    pub fn new(notifier: &Rc<Notifier>) -> Self {
        Self(Store::new(
            LedgerState {
                queue: VecDeque::new(),
                in_flight: None,
                additions: HashMap::new(),
            },
            notifier,
        ))
    }

    /// Appends an addition identified by `temp_id`.
    ///
    /// # Panics
    ///
    /// Panics if `temp_id` was already used by this ledger.
    pub fn enqueue_addition(&self, temp_id: impl Into<String>, draft: T::Draft) {
        let temp_id = temp_id.into();
        assert!(
            !self.0.borrow().additions.contains_key(&temp_id),
            "temporary id `{temp_id}` is already used"
        );
        let mut s = self.0.borrow_mut();
        s.additions.insert(temp_id.clone(), Addition::Pending);
        s.queue.push_back(PendingChange::Add { temp_id, draft });
    }

    /// Appends an update of `entity`.
    ///
    /// An update of a created provisional row is sent to its server id.
    /// Returns `false` and queues nothing if `entity` is a provisional row whose addition was rejected.
    pub fn enqueue_update(&self, mut entity: T) -> bool {
        match self.0.borrow().target(entity.id()) {
            Target::Unchanged => {}
            Target::Created(id) => entity.set_id(id),
            Target::Rejected => return false,
        }
        self.0
            .borrow_mut()
            .queue
            .push_back(PendingChange::Update { entity });
        true
    }

    /// Appends a deletion of `entity`.
    ///
    /// If `entity` is a provisional row whose addition is still queued,
    /// the addition and every queued change targeting it are removed and nothing is sent.
    /// A deletion of a created provisional row is sent to its server id,
    /// and a deletion of a provisional row whose addition was rejected is cancelled.
    pub fn enqueue_deletion(&self, mut entity: T) -> Deletion<T> {
        match self.0.borrow().target(entity.id()) {
            Target::Unchanged => {}
            Target::Created(id) => entity.set_id(id),
            Target::Rejected => return Deletion::Cancelled(Vec::new()),
        }
        let mut s = self.0.borrow_mut();
        let id = entity.id();
        let is_queued_add = s
            .queue
            .iter()
            .any(|c| c.is_add() && c.target_id() == id);
        if is_queued_add {
            let (removed, kept): (Vec<_>, Vec<_>) =
                s.queue.drain(..).partition(|c| c.target_id() == id);
            s.queue = kept.into();
            Deletion::Cancelled(removed)
        } else {
            s.queue.push_back(PendingChange::Delete { entity });
            Deletion::Enqueued
        }
    }

    /// Moves the oldest queued change into flight and returns it.
    ///
    /// # Panics
    ///
    /// Panics if a change is already in flight.
    pub(crate) fn dequeue_next(&self) -> Option<PendingChange<T>> {
        {
            let s = self.0.borrow();
            assert!(s.in_flight.is_none(), "a change is already in flight");
            if s.queue.is_empty() {
                return None;
            }
        }
        let mut s = self.0.borrow_mut();
        let change = s.queue.pop_front()?;
        s.in_flight = Some(change.clone());
        Some(change)
    }

    /// Removes the in-flight change.
    pub(crate) fn settle(&self) -> Option<PendingChange<T>> {
        if self.0.borrow().in_flight.is_none() {
            return None;
        }
        self.0.borrow_mut().in_flight.take()
    }

    /// Records that the provisional row `temp_id` was created as `id`,
    /// and points queued changes that target it at `id`.
    pub(crate) fn rebind(&self, temp_id: &str, id: &str) {
        if !self.0.borrow().additions.contains_key(temp_id) {
            return;
        }
        let mut s = self.0.borrow_mut();
        s.additions
            .insert(temp_id.to_owned(), Addition::Created(id.to_owned()));
        for change in &mut s.queue {
            match change {
                PendingChange::Update { entity } | PendingChange::Delete { entity }
                    if entity.id() == temp_id =>
                {
                    entity.set_id(id.to_owned());
                }
                _ => {}
            }
        }
    }

    /// Records that the addition of the provisional row `temp_id` was rejected,
    /// and removes the queued changes that target it and returns them.
    pub(crate) fn discard_target(&self, temp_id: &str) -> Vec<PendingChange<T>> {
        {
            let s = self.0.borrow();
            if !s.additions.contains_key(temp_id)
                && !s.queue.iter().any(|c| c.target_id() == temp_id)
            {
                return Vec::new();
            }
        }
        let mut s = self.0.borrow_mut();
        if let Some(addition) = s.additions.get_mut(temp_id) {
            *addition = Addition::Rejected;
        }
        let (removed, kept): (Vec<_>, Vec<_>) =
            s.queue.drain(..).partition(|c| c.target_id() == temp_id);
        s.queue = kept.into();
        removed
    }

    /// Returns the number of queued changes, not counting the in-flight one.
    pub fn len(&self) -> usize {
        self.0.borrow().queue.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.borrow().queue.is_empty()
    }
    pub fn in_flight(&self) -> Option<PendingChange<T>> {
        self.0.borrow().in_flight.clone()
    }

    pub fn borrow(&self) -> LedgerRef<'_, T> {
        LedgerRef(self.0.borrow())
    }
}

/// A borrowed view of a [`Ledger`].
pub struct LedgerRef<'a, T: Entity>(Ref<'a, LedgerState<T>>);

impl<T: Entity> LedgerRef<'_, T> {
    /// Iterates the in-flight change, if any, followed by the queued changes in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChange<T>> {
        self.0.in_flight.iter().chain(self.0.queue.iter())
    }
    pub fn in_flight(&self) -> Option<&PendingChange<T>> {
        self.0.in_flight.as_ref()
    }
    pub fn queued(&self) -> impl Iterator<Item = &PendingChange<T>> {
        self.0.queue.iter()
    }
}

impl<T: Entity> std::fmt::Debug for Ledger<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.borrow();
        f.debug_list().entries(s.iter()).finish()
    }
}
