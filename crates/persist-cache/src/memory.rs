//! In-memory coordinator for tests and embedding.
//!
//! [`InMemoryJar`] keeps one state record per oid in a `HashMap` behind a
//! `RwLock`, counts every call made by the cache, and can be told to fail
//! loads, dirty registrations or release notifications.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use persist_types::{Oid, Serial};

use crate::error::{LoadError, NotifyError};
use crate::jar::{Jar, LoadContext};

#[derive(Clone)]
struct Record<S> {
    state: S,
    serial: Serial,
}

/// HashMap-backed [`Jar`].
pub struct InMemoryJar<S> {
    records: RwLock<HashMap<Oid, Record<S>>>,
    registered: RwLock<Vec<Option<Oid>>>,
    loads: AtomicUsize,
    registrations: AtomicUsize,
    releases: AtomicUsize,
    fail_loads: AtomicBool,
    fail_registrations: AtomicBool,
    fail_releases: AtomicBool,
}

impl<S> InMemoryJar<S> {
    /// Create a jar with no records.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            registered: RwLock::new(Vec::new()),
            loads: AtomicUsize::new(0),
            registrations: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            fail_loads: AtomicBool::new(false),
            fail_registrations: AtomicBool::new(false),
            fail_releases: AtomicBool::new(false),
        }
    }

    /// Store (or replace) the state served for `oid`.
    pub fn store(&self, oid: Oid, state: S, serial: Serial) {
        self.records
            .write()
            .expect("lock poisoned")
            .insert(oid, Record { state, serial });
    }

    /// Remove the record for `oid`. Returns `true` if it existed.
    pub fn remove(&self, oid: &Oid) -> bool {
        self.records
            .write()
            .expect("lock poisoned")
            .remove(oid)
            .is_some()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Serial of the stored record for `oid`.
    pub fn serial_of(&self, oid: &Oid) -> Option<Serial> {
        self.records
            .read()
            .expect("lock poisoned")
            .get(oid)
            .map(|r| r.serial)
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn register_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Objects registered as dirty since the last [`take_registered`](Self::take_registered).
    pub fn registered(&self) -> Vec<Option<Oid>> {
        self.registered.read().expect("lock poisoned").clone()
    }

    /// Drain the dirty list, as a transaction boundary would.
    pub fn take_registered(&self) -> Vec<Option<Oid>> {
        std::mem::take(&mut *self.registered.write().expect("lock poisoned"))
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registrations.store(fail, Ordering::SeqCst);
    }

    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }
}

impl<S> Default for InMemoryJar<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Send + Sync> Jar<S> for InMemoryJar<S> {
    fn load_state(&self, ctx: &mut LoadContext<'_, S>) -> Result<(), LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let oid = ctx.oid();
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(LoadError::new(oid, "injected load failure"));
        }
        let oid = oid.ok_or_else(|| LoadError::new(None, "object has no oid"))?;
        let record = self
            .records
            .read()
            .expect("lock poisoned")
            .get(&oid)
            .cloned()
            .ok_or_else(|| LoadError::new(Some(oid), "no record for oid"))?;

        ctx.install(record.state);
        ctx.set_serial(record.serial);
        Ok(())
    }

    fn register_dirty(&self, oid: Option<Oid>) -> Result<(), NotifyError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.fail_registrations.load(Ordering::SeqCst) {
            return Err(NotifyError::new(oid, "injected registration failure"));
        }
        self.registered.write().expect("lock poisoned").push(oid);
        Ok(())
    }

    fn released(&self, oid: Option<Oid>) -> Result<(), NotifyError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(NotifyError::new(oid, "injected release failure"));
        }
        Ok(())
    }
}

impl<S> fmt::Debug for InMemoryJar<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryJar")
            .field("record_count", &self.len())
            .field("loads", &self.load_count())
            .field("registrations", &self.register_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::jar::JarRef;
    use crate::object::PersistentObject;

    #[test]
    fn store_and_remove() {
        let jar: InMemoryJar<String> = InMemoryJar::new();
        assert!(jar.is_empty());
        jar.store(Oid::from_u64(1), "a".into(), Serial::from_u64(1));
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.serial_of(&Oid::from_u64(1)), Some(Serial::from_u64(1)));
        assert!(jar.remove(&Oid::from_u64(1)));
        assert!(!jar.remove(&Oid::from_u64(1)));
    }

    #[test]
    fn missing_record_is_load_error() {
        let jar: JarRef<String> = Arc::new(InMemoryJar::new());
        let mut obj = PersistentObject::ghost(Oid::from_u64(8), jar);
        let err = obj.ensure_materialized().unwrap_err();
        assert_eq!(err.reason, "no record for oid");
        assert!(obj.is_ghost());
    }

    #[test]
    fn take_registered_drains() {
        let jar: InMemoryJar<String> = InMemoryJar::new();
        jar.register_dirty(Some(Oid::from_u64(1))).unwrap();
        jar.register_dirty(Some(Oid::from_u64(2))).unwrap();
        assert_eq!(jar.take_registered().len(), 2);
        assert!(jar.registered().is_empty());
        assert_eq!(jar.register_count(), 2);
    }

    #[test]
    fn injected_failures() {
        let jar: InMemoryJar<String> = InMemoryJar::new();
        jar.fail_registrations(true);
        jar.fail_releases(true);
        assert!(jar.register_dirty(None).is_err());
        assert!(jar.released(None).is_err());
        assert!(jar.registered().is_empty());
    }

    #[test]
    fn debug_format() {
        let jar: InMemoryJar<String> = InMemoryJar::new();
        let debug = format!("{jar:?}");
        assert!(debug.contains("InMemoryJar"));
        assert!(debug.contains("record_count"));
    }
}
