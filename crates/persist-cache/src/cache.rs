use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use persist_ring::{Ring, Slot};
use persist_types::{ChangedFlag, FieldKind, LifecycleState, Oid, Serial};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{AttachmentConflict, CacheError, CacheResult, NotifyError};
use crate::jar::{JarRef, LoadContext};
use crate::object::PersistentObject;

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Cache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheId(u64);

impl CacheId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Generational handle to an object held by a [`Cache`].
///
/// Keys do not keep objects alive. A key whose object has been detached or
/// cleared is stale and is rejected with [`CacheError::UnknownObject`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    slot: Slot,
    generation: u32,
}

struct Entry<S> {
    generation: u32,
    object: Option<PersistentObject<S>>,
}

/// A cache shared across threads behind one coarse lock.
pub type SharedCache<S> = Arc<Mutex<Cache<S>>>;

/// Arena-backed object cache with LRU re-ghosting.
///
/// The cache owns every attached object in a slot arena. The identity index
/// maps oids to keys and never keeps an object alive on its own; the ring
/// orders the materialized slots by recency. `non_ghost_count` always equals
/// the ring length.
pub struct Cache<S> {
    id: CacheId,
    config: CacheConfig,
    entries: Vec<Entry<S>>,
    free: Vec<Slot>,
    index: HashMap<Oid, ObjectKey>,
    ring: Ring,
    non_ghost_count: u64,
}

impl<S> Cache<S> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            id: CacheId::next(),
            ring: Ring::with_capacity(config.target_size),
            config,
            entries: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            non_ghost_count: 0,
        }
    }

    /// Wrap the cache for use from several threads.
    pub fn into_shared(self) -> SharedCache<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> CacheId {
        self.id
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of attached objects, ghosts included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of materialized attached objects.
    pub fn non_ghost_count(&self) -> u64 {
        self.non_ghost_count
    }

    /// Number of slots linked into the recency ring.
    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` if the object's slot is linked into the recency ring.
    pub fn is_linked(&self, key: ObjectKey) -> bool {
        self.slot_of(key)
            .map(|slot| self.ring.is_linked(slot))
            .unwrap_or(false)
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.slot_of(key).is_ok()
    }

    pub fn get(&self, key: ObjectKey) -> Option<&PersistentObject<S>> {
        let slot = self.slot_of(key).ok()?;
        self.entries[slot].object.as_ref()
    }

    pub(crate) fn get_mut(&mut self, key: ObjectKey) -> Option<&mut PersistentObject<S>> {
        let slot = self.slot_of(key).ok()?;
        self.entries[slot].object.as_mut()
    }

    /// Find an attached object by identity.
    pub fn lookup(&self, oid: Oid) -> Option<ObjectKey> {
        self.index
            .get(&oid)
            .copied()
            .filter(|key| self.contains(*key))
    }

    pub fn state(&self, key: ObjectKey) -> CacheResult<LifecycleState> {
        Ok(self.object(key)?.state())
    }

    /// Materialized state without triggering a load.
    pub fn data(&self, key: ObjectKey) -> CacheResult<Option<&S>> {
        Ok(self.object(key)?.data())
    }

    /// Mutable materialized state. Call [`Cache::before_write`] first so the
    /// change is registered.
    pub fn data_mut(&mut self, key: ObjectKey) -> CacheResult<Option<&mut S>> {
        Ok(self.object_mut(key)?.data_mut())
    }

    /// Keys from least to most recently used, materialized objects only.
    pub fn iter_lru(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.ring.iter_from_tail().map(move |slot| self.key_at(slot))
    }

    /// Keys of every attached object, in slot order.
    pub fn keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.object.is_some())
            .map(|(slot, entry)| ObjectKey {
                slot,
                generation: entry.generation,
            })
    }

    // ---- Attachment ----

    /// Register an object under its identity and take ownership of it.
    ///
    /// Materialized objects are linked into the ring immediately.
    pub fn attach(&mut self, mut object: PersistentObject<S>) -> CacheResult<ObjectKey> {
        if let Some(home) = object.cache_id() {
            if home != self.id {
                return Err(AttachmentConflict::ForeignCache.into());
            }
        }
        let oid = object.oid().ok_or(AttachmentConflict::MissingIdentity)?;
        if self.lookup(oid).is_some() {
            return Err(AttachmentConflict::IdentityInUse(oid).into());
        }

        object.attach_to(self.id);
        let materialized = object.state().is_materialized();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot].object = Some(object);
                slot
            }
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    object: Some(object),
                });
                self.entries.len() - 1
            }
        };
        if materialized {
            self.link(slot);
        }

        let key = self.key_at(slot);
        self.index.insert(oid, key);
        debug!(%oid, slot, materialized, "attached object");
        Ok(key)
    }

    /// Remove an object from the cache and hand it back.
    ///
    /// The object keeps its state and remembers this cache as its home.
    pub fn detach(&mut self, key: ObjectKey) -> CacheResult<PersistentObject<S>> {
        let slot = self.slot_of(key)?;
        if self.entries[slot].object.as_ref().map(|o| o.state()) == Some(LifecycleState::Loading) {
            return Err(CacheError::ObjectLoading(key));
        }

        self.unlink(slot);
        let object = self.release_slot(slot);
        debug!(oid = ?object.oid(), slot, "detached object");
        Ok(object)
    }

    // ---- State machine ----

    /// Load state from the object's coordinator if it is a ghost.
    ///
    /// The object is linked and counted before the coordinator is called and
    /// sits in [`LifecycleState::Loading`] for the duration of the call.
    pub fn ensure_materialized(&mut self, key: ObjectKey) -> CacheResult<()> {
        let slot = self.slot_of(key)?;
        let Some(jar) = self.slot_object_mut(slot).begin_load() else {
            return Ok(());
        };
        self.link(slot);

        let outcome = jar.load_state(&mut LoadContext::cached(self, key));

        // The coordinator may have ghostified and detached the object.
        let Ok(slot) = self.slot_of(key) else {
            return outcome.map_err(CacheError::from);
        };
        match outcome.and_then(|()| self.slot_object_mut(slot).finish_load()) {
            Ok(()) => {
                debug!(oid = ?self.slot_object(slot).oid(), slot, "materialized object");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, slot, "load failed; object stays a ghost");
                self.ghostify_slot(slot);
                Err(err.into())
            }
        }
    }

    /// Mark the object as most recently used.
    pub fn record_access(&mut self, key: ObjectKey) -> CacheResult<()> {
        let slot = self.slot_of(key)?;
        if self.slot_object(slot).state().is_materialized() && self.ring.is_linked(slot) {
            self.ring.move_to_head(slot);
        }
        Ok(())
    }

    /// Register the object as dirty; see [`PersistentObject::mark_changed`].
    pub fn mark_changed(&mut self, key: ObjectKey) -> CacheResult<()> {
        self.object_mut(key)?.mark_changed()?;
        Ok(())
    }

    /// Drop the object's state and unlink it from the ring.
    pub fn ghostify(&mut self, key: ObjectKey) -> CacheResult<()> {
        let slot = self.slot_of(key)?;
        self.ghostify_slot(slot);
        Ok(())
    }

    /// Ghostify the object if it is up to date; otherwise do nothing.
    pub fn deactivate(&mut self, key: ObjectKey) -> CacheResult<()> {
        let slot = self.slot_of(key)?;
        let Some(jar) = self.slot_object(slot).deactivation_jar() else {
            return Ok(());
        };
        let outcome = jar.released(self.slot_object(slot).oid());
        self.ghostify_slot(slot);
        let mode = self.config.deactivation_errors;
        self.slot_object_mut(slot).settle_release(outcome, mode)?;
        Ok(())
    }

    /// Materialize if needed and pin the object against eviction.
    pub fn set_sticky(&mut self, key: ObjectKey) -> CacheResult<()> {
        self.ensure_materialized(key)?;
        self.object_mut(key)?.pin();
        Ok(())
    }

    pub fn release_sticky(&mut self, key: ObjectKey) -> CacheResult<()> {
        self.object_mut(key)?.release_sticky();
        Ok(())
    }

    /// Assign the object's "changed" attribute.
    pub fn set_changed(&mut self, key: ObjectKey, flag: ChangedFlag) -> CacheResult<()> {
        match flag {
            ChangedFlag::Dirty => self.mark_changed(key),
            ChangedFlag::Clean => {
                self.object_mut(key)?.force_up_to_date();
                self.deactivate(key)
            }
            ChangedFlag::Unset => self.deactivate(key),
        }
    }

    /// Called by the coordinator after storing the object's state.
    pub fn mark_persisted(&mut self, key: ObjectKey, serial: Serial) -> CacheResult<()> {
        self.object_mut(key)?.mark_persisted(serial);
        Ok(())
    }

    /// Hook run before a materialized field is read.
    pub fn before_read(&mut self, key: ObjectKey) -> CacheResult<()> {
        self.ensure_materialized(key)?;
        self.record_access(key)
    }

    /// Hook run before a field is written.
    pub fn before_write(&mut self, key: ObjectKey, kind: FieldKind) -> CacheResult<()> {
        if kind == FieldKind::Lifecycle {
            // Still validates the key.
            self.slot_of(key)?;
            return Ok(());
        }
        self.ensure_materialized(key)?;
        self.record_access(key)?;
        if kind == FieldKind::Persistent {
            self.mark_changed(key)?;
        }
        Ok(())
    }

    /// Materialize and return the state, for export to a serializer.
    pub fn materialized_state(&mut self, key: ObjectKey) -> CacheResult<&S> {
        self.before_read(key)?;
        let object = self.object(key)?;
        object
            .data()
            .ok_or(CacheError::NotMaterialized(object.oid()))
    }

    // ---- Lifecycle fields ----

    pub fn set_oid(&mut self, key: ObjectKey, oid: Option<Oid>) -> CacheResult<()> {
        self.object_mut(key)?.set_oid(oid)
    }

    pub fn set_jar(&mut self, key: ObjectKey, jar: Option<JarRef<S>>) -> CacheResult<()> {
        self.object_mut(key)?.set_jar(jar)
    }

    pub fn set_serial(&mut self, key: ObjectKey, bytes: &[u8]) -> CacheResult<()> {
        self.object_mut(key)?.set_serial(bytes)
    }

    pub fn clear_serial(&mut self, key: ObjectKey) -> CacheResult<()> {
        self.object_mut(key)?.clear_serial();
        Ok(())
    }

    pub fn take_recorded_error(&mut self, key: ObjectKey) -> CacheResult<Option<NotifyError>> {
        Ok(self.object_mut(key)?.take_recorded_error())
    }

    // ---- Eviction ----

    /// Ghostify least recently used objects until at most `target` remain
    /// materialized or the ring is exhausted.
    ///
    /// Only up-to-date objects with a coordinator to reload from are evicted;
    /// changed, sticky and loading objects are skipped. Returns the number of
    /// objects evicted.
    pub fn evict_excess(&mut self, target: u64) -> usize {
        let mut evicted = 0;
        let mut cursor = self.ring.tail();
        while self.non_ghost_count > target {
            let Some(slot) = cursor else { break };
            cursor = self.ring.prev(slot);

            let object = self.slot_object(slot);
            if object.state().is_evictable() && object.jar().is_some() {
                self.ghostify_slot(slot);
                evicted += 1;
            }
        }
        debug!(
            evicted,
            target,
            remaining = self.non_ghost_count,
            "eviction pass"
        );
        evicted
    }

    /// Evict down to the configured target size.
    pub fn incremental_gc(&mut self) -> usize {
        self.evict_excess(self.config.target_size as u64)
    }

    /// Evict every evictable object.
    pub fn minimize(&mut self) -> usize {
        self.evict_excess(0)
    }

    /// Forget the state of the object with this identity, even if changed.
    ///
    /// Returns `false` if no such object is attached.
    pub fn invalidate(&mut self, oid: Oid) -> CacheResult<bool> {
        let Some(key) = self.lookup(oid) else {
            return Ok(false);
        };
        self.set_changed(key, ChangedFlag::Clean)?;
        Ok(true)
    }

    /// Ghostify every attached object, empty the identity index and release
    /// all slots. Outstanding keys become stale.
    pub fn clear(&mut self) {
        let linked = self.ring.drain();
        assert_eq!(
            self.non_ghost_count,
            linked.len() as u64,
            "cache fault: non-ghost count disagrees with the ring"
        );
        for &slot in &linked {
            self.slot_object_mut(slot).discard_state();
        }
        self.non_ghost_count = 0;

        let mut released = 0usize;
        for slot in 0..self.entries.len() {
            if self.entries[slot].object.is_some() {
                drop(self.release_slot(slot));
                released += 1;
            }
        }
        self.index.clear();
        info!(released, cache = ?self.id, "cache cleared");
    }

    // ---- Internals ----

    fn key_at(&self, slot: Slot) -> ObjectKey {
        ObjectKey {
            slot,
            generation: self.entries[slot].generation,
        }
    }

    fn slot_of(&self, key: ObjectKey) -> CacheResult<Slot> {
        match self.entries.get(key.slot) {
            Some(entry) if entry.generation == key.generation && entry.object.is_some() => {
                Ok(key.slot)
            }
            _ => Err(CacheError::UnknownObject(key)),
        }
    }

    fn object(&self, key: ObjectKey) -> CacheResult<&PersistentObject<S>> {
        let slot = self.slot_of(key)?;
        Ok(self.slot_object(slot))
    }

    fn object_mut(&mut self, key: ObjectKey) -> CacheResult<&mut PersistentObject<S>> {
        let slot = self.slot_of(key)?;
        Ok(self.slot_object_mut(slot))
    }

    fn slot_object(&self, slot: Slot) -> &PersistentObject<S> {
        match &self.entries[slot].object {
            Some(object) => object,
            None => panic!("cache fault: slot {slot} is empty"),
        }
    }

    fn slot_object_mut(&mut self, slot: Slot) -> &mut PersistentObject<S> {
        match &mut self.entries[slot].object {
            Some(object) => object,
            None => panic!("cache fault: slot {slot} is empty"),
        }
    }

    fn link(&mut self, slot: Slot) {
        self.ring.add_to_head(slot);
        self.non_ghost_count += 1;
    }

    fn unlink(&mut self, slot: Slot) {
        if !self.ring.is_linked(slot) {
            return;
        }
        self.non_ghost_count = match self.non_ghost_count.checked_sub(1) {
            Some(count) => count,
            None => panic!("cache fault: non-ghost count would go negative"),
        };
        self.ring.remove(slot);
    }

    fn ghostify_slot(&mut self, slot: Slot) {
        if self.slot_object(slot).is_ghost() {
            return;
        }
        self.unlink(slot);
        self.slot_object_mut(slot).discard_state();
        debug!(slot, "ghostified object");
    }

    /// Deregister and take the object out of `slot`. The slot must already
    /// be unlinked.
    fn release_slot(&mut self, slot: Slot) -> PersistentObject<S> {
        debug_assert!(!self.ring.is_linked(slot));
        let key = self.key_at(slot);
        let entry = &mut self.entries[slot];
        let object = match entry.object.take() {
            Some(object) => object,
            None => panic!("cache fault: releasing empty slot {slot}"),
        };
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot);

        if let Some(oid) = object.oid() {
            if self.index.get(&oid) == Some(&key) {
                self.index.remove(&oid);
            }
        }
        object
    }
}

impl<S> Default for Cache<S> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<S> fmt::Debug for Cache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("id", &self.id)
            .field("object_count", &self.len())
            .field("non_ghost_count", &self.non_ghost_count)
            .field("target_size", &self.config.target_size)
            .finish()
    }
}
