use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use futures::{future::LocalBoxFuture, FutureExt};

use super::{Gateway, GatewayError};
use crate::Entity;


/// An in-memory remote API.
///
/// Ids are assigned sequentially (`"1"`, `"2"`, ...), skipping ids that are already taken.
/// Failures queued with [`fail_next`](Self::fail_next) are returned by the following calls, one per call.
pub struct MemoryGateway<T> {
    items: RefCell<Vec<T>>,
    next_id: Cell<u64>,
    failures: RefCell<VecDeque<GatewayError>>,
}

impl<T: Entity> MemoryGateway<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            next_id: Cell::new(items.len() as u64 + 1),
            items: RefCell::new(items),
            failures: RefCell::new(VecDeque::new()),
        }
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.failures.borrow_mut().push_back(error);
    }

    /// Returns the entities currently held by the server.
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    fn take_failure(&self) -> Result<(), GatewayError> {
        match self.failures.borrow_mut().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
    fn assign_id(&self) -> String {
        let items = self.items.borrow();
        loop {
            let id = self.next_id.get().to_string();
            self.next_id.set(self.next_id.get() + 1);
            if !items.iter().any(|item| item.id() == id) {
                return id;
            }
        }
    }
}

impl<T: Entity> Default for MemoryGateway<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Entity> Gateway<T> for MemoryGateway<T> {
    fn list(&self) -> LocalBoxFuture<'_, Result<Vec<T>, GatewayError>> {
        async move {
            self.take_failure()?;
            Ok(self.items())
        }
        .boxed_local()
    }

    fn create<'a>(&'a self, draft: &'a T::Draft) -> LocalBoxFuture<'a, Result<T, GatewayError>> {
        async move {
            self.take_failure()?;
            let entity = T::from_draft(self.assign_id(), draft.clone());
            self.items.borrow_mut().push(entity.clone());
            Ok(entity)
        }
        .boxed_local()
    }

    fn update<'a>(&'a self, entity: &'a T) -> LocalBoxFuture<'a, Result<T, GatewayError>> {
        async move {
            self.take_failure()?;
            let mut items = self.items.borrow_mut();
            let item = items
                .iter_mut()
                .find(|item| item.id() == entity.id())
                .ok_or_else(GatewayError::not_found)?;
            *item = entity.clone();
            Ok(entity.clone())
        }
        .boxed_local()
    }

    fn delete<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<(), GatewayError>> {
        async move {
            self.take_failure()?;
            let mut items = self.items.borrow_mut();
            let len = items.len();
            items.retain(|item| item.id() != id);
            if items.len() == len {
                return Err(GatewayError::not_found());
            }
            Ok(())
        }
        .boxed_local()
    }
}
