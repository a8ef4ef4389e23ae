use std::sync::Arc;

use persist_types::{LifecycleState, Oid, Serial};

use crate::cache::{Cache, ObjectKey};
use crate::error::{CacheResult, LoadError, NotifyError};
use crate::object::PersistentObject;

/// Transaction coordinator / backing-store proxy consulted by objects.
///
/// Implementations must satisfy these rules:
/// - `load_state` installs the object's state through the [`LoadContext`]
///   before returning `Ok`. Returning `Ok` without installing is a load
///   failure.
/// - `register_dirty` is called at most once per object between
///   materialization and the next commit/abort boundary.
/// - Calls are synchronous from the cache's point of view. Retrying is the
///   coordinator's business; the cache never retries.
pub trait Jar<S>: Send + Sync {
    /// Populate the state of the object being materialized.
    fn load_state(&self, ctx: &mut LoadContext<'_, S>) -> Result<(), LoadError>;

    /// Record that the object has been modified in the current transaction.
    fn register_dirty(&self, oid: Option<Oid>) -> Result<(), NotifyError>;

    /// The object's state is being dropped by a voluntary deactivation.
    fn released(&self, _oid: Option<Oid>) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Shared handle to a coordinator.
pub type JarRef<S> = Arc<dyn Jar<S>>;

/// Identity comparison for coordinator handles.
pub fn same_jar<S>(a: &JarRef<S>, b: &JarRef<S>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

enum Target<'a, S> {
    Detached(&'a mut PersistentObject<S>),
    Cached { cache: &'a mut Cache<S>, key: ObjectKey },
}

/// Handle given to [`Jar::load_state`] for the object being materialized.
///
/// The object is in [`LifecycleState::Loading`] for the duration of the
/// call. Touching it again through [`LoadContext::before_read`] is a no-op;
/// sibling objects in the same cache are reachable through
/// [`LoadContext::cache`] and run their own state machines.
pub struct LoadContext<'a, S> {
    target: Target<'a, S>,
}

impl<'a, S> LoadContext<'a, S> {
    pub(crate) fn detached(object: &'a mut PersistentObject<S>) -> Self {
        Self {
            target: Target::Detached(object),
        }
    }

    pub(crate) fn cached(cache: &'a mut Cache<S>, key: ObjectKey) -> Self {
        Self {
            target: Target::Cached { cache, key },
        }
    }

    fn object(&self) -> Option<&PersistentObject<S>> {
        match &self.target {
            Target::Detached(object) => Some(&**object),
            Target::Cached { cache, key } => cache.get(*key),
        }
    }

    fn object_mut(&mut self) -> Option<&mut PersistentObject<S>> {
        match &mut self.target {
            Target::Detached(object) => Some(&mut **object),
            Target::Cached { cache, key } => cache.get_mut(*key),
        }
    }

    /// Identity of the object being loaded.
    pub fn oid(&self) -> Option<Oid> {
        self.object().and_then(|o| o.oid())
    }

    /// Current lifecycle state of the object being loaded.
    ///
    /// Reports `Ghost` if the object was ghostified or left the cache
    /// during the load.
    pub fn state(&self) -> LifecycleState {
        self.object()
            .map(|o| o.state())
            .unwrap_or(LifecycleState::Ghost)
    }

    /// Cache key of the object, if it is cache-resident.
    pub fn key(&self) -> Option<ObjectKey> {
        match &self.target {
            Target::Detached(_) => None,
            Target::Cached { key, .. } => Some(*key),
        }
    }

    /// Install the loaded state. Returns `false` if the object is no longer
    /// materialized and the state was dropped.
    pub fn install(&mut self, state: S) -> bool {
        match self.object_mut() {
            Some(object) if object.state().is_materialized() => {
                object.install(state);
                true
            }
            _ => false,
        }
    }

    /// Record the serial of the loaded state.
    pub fn set_serial(&mut self, serial: Serial) {
        if let Some(object) = self.object_mut() {
            object.set_serial_value(serial);
        }
    }

    /// Touch the loading object as the read hook would.
    pub fn before_read(&mut self) -> CacheResult<()> {
        match &mut self.target {
            Target::Detached(object) => object.before_read(),
            Target::Cached { cache, key } => cache.before_read(*key),
        }
    }

    /// The cache holding the object, for reaching sibling objects.
    pub fn cache(&mut self) -> Option<&mut Cache<S>> {
        match &mut self.target {
            Target::Detached(_) => None,
            Target::Cached { cache, .. } => Some(&mut **cache),
        }
    }
}
