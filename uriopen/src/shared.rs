use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::{DynOpener, Opener, OpenerRegistry, ValueStream};

/// An [`OpenerRegistry`] that accepts registrations through a shared reference.
///
/// Holds an atomically swapped snapshot: registering builds a new registry
/// value and publishes it, resolving loads the current snapshot. Neither side
/// takes a lock, so backends can be plugged in at any point while other tasks
/// keep resolving.
pub struct SharedRegistry {
    snap: ArcSwap<OpenerRegistry>,
}

impl fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedRegistry")
            .field(&*self.snap.load())
            .finish()
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl From<OpenerRegistry> for SharedRegistry {
    fn from(registry: OpenerRegistry) -> Self {
        Self {
            snap: ArcSwap::from_pointee(registry),
        }
    }
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::from(OpenerRegistry::new())
    }

    /// Bind `scheme` to `opener`, replacing any previous binding.
    ///
    /// Returns `&Self` so calls can be chained.
    pub fn register<O: Opener + 'static>(&self, scheme: impl Into<String>, opener: O) -> &Self {
        self.register_dyn(scheme, Arc::new(opener))
    }

    pub fn register_dyn(&self, scheme: impl Into<String>, opener: DynOpener) -> &Self {
        let scheme = scheme.into();
        // rcu retries if another registration was published in between.
        self.snap.rcu(|current| {
            OpenerRegistry::clone(current).register_dyn(scheme.clone(), opener.clone())
        });
        self
    }

    /// The current bindings as a standalone registry value.
    ///
    /// Later registrations on `self` are not visible in the returned value.
    pub fn snapshot(&self) -> OpenerRegistry {
        OpenerRegistry::clone(&self.snap.load())
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.snap.load().contains(scheme)
    }

    /// Resolve `uri` against the current snapshot.
    ///
    /// See [`OpenerRegistry::resolve`].
    pub async fn resolve(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        let snap = self.snap.load_full();
        snap.resolve(uri).await
    }
}
