use std::{cell::Ref, rc::Rc};

use derive_ex::derive_ex;

use crate::{notify::Store, Entity, Notifier};

/// The server-confirmed entities of one feature.
///
/// Only confirmed server results and bulk loads modify this collection.
#[derive_ex(Clone, bound())]
pub struct EntityCollection<T: Entity>(Store<CollectionState<T>>);

struct CollectionState<T> {
    items: Vec<T>,
    is_loading: bool,
}

impl<T: Entity> EntityCollection<T> {
    pub fn new(items: Vec<T>, notifier: &Rc<Notifier>) -> Self {
        Self(Store::new(
            CollectionState {
                items,
                is_loading: false,
            },
            notifier,
        ))
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.0.borrow().items.iter().find(|e| e.id() == id).cloned()
    }
    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }
    pub fn is_loading(&self) -> bool {
        self.0.borrow().is_loading
    }
    pub fn to_vec(&self) -> Vec<T> {
        self.0.borrow().items.clone()
    }
    pub fn borrow(&self) -> Ref<'_, [T]> {
        Ref::map(self.0.borrow(), |s| s.items.as_slice())
    }

    pub(crate) fn set_loading(&self, is_loading: bool) {
        if self.0.borrow().is_loading != is_loading {
            self.0.borrow_mut().is_loading = is_loading;
        }
    }

    /// Replaces every entity and ends loading.
    pub(crate) fn replace_all(&self, items: Vec<T>) {
        let mut s = self.0.borrow_mut();
        s.items = items;
        s.is_loading = false;
    }

    /// Replaces the entity with the same id, or appends `entity`.
    pub(crate) fn upsert(&self, entity: T) {
        let mut s = self.0.borrow_mut();
        match s.items.iter_mut().find(|e| e.id() == entity.id()) {
            Some(e) => *e = entity,
            None => s.items.push(entity),
        }
    }

    pub(crate) fn remove(&self, id: &str) -> Option<T> {
        let index = self.0.borrow().items.iter().position(|e| e.id() == id)?;
        Some(self.0.borrow_mut().items.remove(index))
    }
}

impl<T: Entity> std::fmt::Debug for EntityCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.borrow().iter()).finish()
    }
}
