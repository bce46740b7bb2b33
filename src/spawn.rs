use std::{future::Future, rc::Rc};

use futures::{
    future::LocalBoxFuture,
    task::{LocalSpawn, LocalSpawnExt},
    FutureExt,
};

/// Runs background tasks on the UI thread's executor.
#[derive(Clone)]
pub struct Spawner(Rc<dyn Fn(LocalBoxFuture<'static, ()>)>);

impl Spawner {
    pub fn new(f: impl Fn(LocalBoxFuture<'static, ()>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Creates a `Spawner` from a local executor such as [`futures::executor::LocalSpawner`].
    pub fn from_local_spawn(sp: impl LocalSpawn + 'static) -> Self {
        Self::new(move |fut| {
            if let Err(e) = sp.spawn_local(fut) {
                tracing::error!(error = %e, "failed to spawn outbox task");
            }
        })
    }

    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        (self.0)(fut.boxed_local())
    }
}

impl std::fmt::Debug for Spawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Spawner").finish_non_exhaustive()
    }
}
