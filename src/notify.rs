use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    rc::Rc,
};

use derive_ex::derive_ex;
use slabmap::SlabMap;

use crate::Subscription;


/// Change notifier shared by every piece of state that belongs to one feature.
///
/// Observers are called after a change has been committed and all borrows of the changed state have been released.
/// A notification raised while observers are running (for example, an observer that enqueues a change)
/// does not call observers recursively; instead, another round of calls is performed when the current round ends.
#[derive(Default)]
pub struct Notifier {
    observers: RefCell<SlabMap<Rc<Observer>>>,
    batch_depth: Cell<usize>,
    is_notifying: Cell<bool>,
    is_pending: Cell<bool>,
}

struct Observer {
    f: RefCell<Box<dyn FnMut()>>,
    is_alive: Cell<bool>,
}

impl Notifier {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Registers `f` to be called each time the state changes.
    ///
    /// If the [`Subscription`] returned from this function is dropped, `f` will not be called again.
    pub fn subscribe(self: &Rc<Self>, f: impl FnMut() + 'static) -> Subscription {
        let observer = Rc::new(Observer {
            f: RefCell::new(Box::new(f)),
            is_alive: Cell::new(true),
        });
        let key = self.observers.borrow_mut().insert(observer);
        Subscription::from_weak_fn(Rc::downgrade(self), move |this| {
            let observer = this.observers.borrow_mut().remove(key);
            if let Some(observer) = observer {
                observer.is_alive.set(false);
            }
        })
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Notifies observers that the state has changed.
    ///
    /// Inside [`batch`](Self::batch), the notification is deferred until the outermost batch ends.
    pub fn notify(&self) {
        self.is_pending.set(true);
        if self.batch_depth.get() > 0 || self.is_notifying.get() {
            return;
        }
        let _guard = FlagGuard::set(&self.is_notifying);
        while self.is_pending.replace(false) {
            let observers: Vec<_> = self.observers.borrow().values().cloned().collect();
            for observer in observers {
                if observer.is_alive.get() {
                    (observer.f.borrow_mut())();
                }
            }
        }
    }

    /// Runs `f` and sends at most one notification after it returns.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.batch_depth.set(self.batch_depth.get() + 1);
        let value = {
            let _guard = DepthGuard(&self.batch_depth);
            f()
        };
        if self.batch_depth.get() == 0 && self.is_pending.get() {
            self.notify();
        }
        value
    }
}

struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}
impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Similar to `Rc<RefCell<T>>`, but notifies a [`Notifier`] when the value is changed.
#[derive_ex(Clone, bound())]
pub struct Store<T: 'static>(Rc<StoreNode<T>>);

struct StoreNode<T> {
    notifier: Rc<Notifier>,
    value: RefCell<T>,
}

impl<T: 'static> Store<T> {
    /// Create a new `Store` with the given initial value that reports changes to `notifier`.
    pub fn new(value: T, notifier: &Rc<Notifier>) -> Self {
        Self(Rc::new(StoreNode {
            notifier: notifier.clone(),
            value: RefCell::new(value),
        }))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.value.borrow()
    }

    /// Mutably borrows the value.
    ///
    /// When the deref_mut of the return value is called and the borrowing ends, the notifier is notified.
    pub fn borrow_mut(&self) -> StoreRefMut<'_, T> {
        StoreRefMut {
            value: Some(self.0.value.borrow_mut()),
            is_dirty: false,
            notifier: &self.0.notifier,
        }
    }

    /// Sets the value and notifies the notifier.
    pub fn set(&self, value: T) {
        *self.borrow_mut() = value;
    }

    pub fn notifier(&self) -> &Rc<Notifier> {
        &self.0.notifier
    }
}
impl<T: std::fmt::Debug> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => std::fmt::Debug::fmt(&*value, f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}

pub struct StoreRefMut<'a, T> {
    value: Option<RefMut<'a, T>>,
    is_dirty: bool,
    notifier: &'a Notifier,
}
impl<T> std::ops::Deref for StoreRefMut<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        match &self.value {
            Some(value) => &**value,
            None => unreachable!(),
        }
    }
}
impl<T> std::ops::DerefMut for StoreRefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.is_dirty = true;
        match &mut self.value {
            Some(value) => &mut **value,
            None => unreachable!(),
        }
    }
}
impl<T> Drop for StoreRefMut<'_, T> {
    fn drop(&mut self) {
        self.value.take();
        if self.is_dirty {
            self.notifier.notify();
        }
    }
}
