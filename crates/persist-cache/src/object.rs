use std::fmt;

use persist_types::{ChangedFlag, FieldKind, LifecycleState, Oid, Serial};
use tracing::{debug, warn};

use crate::cache::CacheId;
use crate::config::DeactivationErrors;
use crate::error::{AttachedField, AttachmentConflict, CacheError, CacheResult, LoadError, NotifyError};
use crate::jar::{same_jar, JarRef, LoadContext};

/// A lazily materialized object backed by a coordinator.
///
/// `S` is the materialized state; the cache never looks inside it. A
/// detached object runs its state machine through its own methods. Once
/// attached, the same transitions are driven through [`Cache`](crate::Cache)
/// so that ring membership and the non-ghost count follow every change.
/// The object's ring linkage lives in the cache's ring, keyed by the slot
/// the object occupies.
pub struct PersistentObject<S> {
    oid: Option<Oid>,
    jar: Option<JarRef<S>>,
    cache: Option<CacheId>,
    state: LifecycleState,
    serial: Serial,
    data: Option<S>,
    recorded_error: Option<NotifyError>,
}

impl<S> PersistentObject<S> {
    /// A detached ghost with no identity and no coordinator.
    pub fn new() -> Self {
        Self {
            oid: None,
            jar: None,
            cache: None,
            state: LifecycleState::Ghost,
            serial: Serial::ZERO,
            data: None,
            recorded_error: None,
        }
    }

    /// A ghost that knows its identity and where to load from.
    pub fn ghost(oid: Oid, jar: JarRef<S>) -> Self {
        Self {
            oid: Some(oid),
            jar: Some(jar),
            ..Self::new()
        }
    }

    /// A detached object created directly in the up-to-date state.
    pub fn materialized(state: S) -> Self {
        Self {
            state: LifecycleState::UpToDate,
            data: Some(state),
            ..Self::new()
        }
    }

    // ---- Accessors ----

    pub fn oid(&self) -> Option<Oid> {
        self.oid
    }

    pub fn jar(&self) -> Option<&JarRef<S>> {
        self.jar.as_ref()
    }

    /// The cache this object was attached to, if any.
    pub fn cache_id(&self) -> Option<CacheId> {
        self.cache
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_ghost(&self) -> bool {
        self.state == LifecycleState::Ghost
    }

    /// Last known version stamp.
    pub fn serial(&self) -> Serial {
        self.serial
    }

    /// The "changed" attribute: `None` for ghosts.
    pub fn changed(&self) -> Option<bool> {
        match self.state {
            LifecycleState::Ghost => None,
            state => Some(state == LifecycleState::Changed),
        }
    }

    /// Materialized state, without triggering a load.
    pub fn data(&self) -> Option<&S> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut S> {
        self.data.as_mut()
    }

    /// Take the last release failure recorded by a deactivation.
    pub fn take_recorded_error(&mut self) -> Option<NotifyError> {
        self.recorded_error.take()
    }

    // ---- Lifecycle fields ----

    /// Set or clear the identity. Frozen once the object has joined a cache.
    pub fn set_oid(&mut self, oid: Option<Oid>) -> CacheResult<()> {
        if self.cache.is_some() {
            match oid {
                None => return Err(AttachmentConflict::AlreadyAttached(AttachedField::Oid).into()),
                Some(new) if self.oid != Some(new) => {
                    return Err(AttachmentConflict::ValueMismatch(AttachedField::Oid).into())
                }
                Some(_) => {}
            }
        }
        self.oid = oid;
        Ok(())
    }

    /// Set or clear the coordinator. Frozen once the object has joined a cache.
    pub fn set_jar(&mut self, jar: Option<JarRef<S>>) -> CacheResult<()> {
        if self.cache.is_some() {
            match (&self.jar, &jar) {
                (_, None) => {
                    return Err(AttachmentConflict::AlreadyAttached(AttachedField::Jar).into())
                }
                (Some(current), Some(new)) if same_jar(current, new) => {}
                (_, Some(_)) => {
                    return Err(AttachmentConflict::ValueMismatch(AttachedField::Jar).into())
                }
            }
        }
        self.jar = jar;
        Ok(())
    }

    /// Set the serial from raw bytes; anything but 8 bytes is rejected.
    pub fn set_serial(&mut self, bytes: &[u8]) -> CacheResult<()> {
        self.serial = Serial::from_slice(bytes).map_err(CacheError::InvalidSerialFormat)?;
        Ok(())
    }

    pub fn set_serial_value(&mut self, serial: Serial) {
        self.serial = serial;
    }

    /// Reset the serial to all zeros.
    pub fn clear_serial(&mut self) {
        self.serial = Serial::ZERO;
    }

    // ---- State machine ----

    /// Load state from the coordinator if this is a ghost.
    ///
    /// No-op for materialized objects and for ghosts without a coordinator.
    /// On failure the object is left as a ghost.
    pub fn ensure_materialized(&mut self) -> Result<(), LoadError> {
        let Some(jar) = self.begin_load() else {
            return Ok(());
        };

        let outcome = jar.load_state(&mut LoadContext::detached(self));
        match outcome.and_then(|()| self.finish_load()) {
            Ok(()) => {
                debug!(oid = ?self.oid, "materialized detached object");
                Ok(())
            }
            Err(err) => {
                warn!(oid = ?self.oid, error = %err, "load failed; object stays a ghost");
                self.ghostify();
                Err(err)
            }
        }
    }

    /// Recency bookkeeping; detached objects are not ordered, so this is a no-op.
    pub fn record_access(&mut self) {}

    /// Register the object as dirty with its coordinator.
    ///
    /// Acts only from `UpToDate` or `Sticky` with a coordinator present. On
    /// failure the state is left untouched.
    pub fn mark_changed(&mut self) -> Result<(), NotifyError> {
        if !matches!(self.state, LifecycleState::UpToDate | LifecycleState::Sticky) {
            return Ok(());
        }
        let Some(jar) = self.jar.clone() else {
            return Ok(());
        };
        jar.register_dirty(self.oid)?;
        self.state = LifecycleState::Changed;
        Ok(())
    }

    /// Drop materialized state unconditionally.
    pub fn ghostify(&mut self) {
        if self.state != LifecycleState::Ghost {
            self.discard_state();
        }
    }

    /// Voluntary ghostification with the default error handling.
    pub fn deactivate(&mut self) -> Result<(), NotifyError> {
        self.deactivate_with(DeactivationErrors::default())
    }

    /// Ghostify if up to date; otherwise a silent no-op.
    pub fn deactivate_with(&mut self, mode: DeactivationErrors) -> Result<(), NotifyError> {
        let Some(jar) = self.deactivation_jar() else {
            return Ok(());
        };
        let outcome = jar.released(self.oid);
        self.ghostify();
        self.settle_release(outcome, mode)
    }

    /// Materialize if needed and pin against ghostification.
    ///
    /// A ghost without a coordinator has nothing to pin and stays a ghost.
    pub fn set_sticky(&mut self) -> Result<(), LoadError> {
        self.ensure_materialized()?;
        self.pin();
        Ok(())
    }

    /// Undo [`set_sticky`](Self::set_sticky).
    pub fn release_sticky(&mut self) {
        if self.state == LifecycleState::Sticky {
            self.state = LifecycleState::UpToDate;
        }
    }

    /// Assign the "changed" attribute with the default error handling.
    pub fn set_changed(&mut self, flag: ChangedFlag) -> CacheResult<()> {
        self.set_changed_with(flag, DeactivationErrors::default())
    }

    pub fn set_changed_with(&mut self, flag: ChangedFlag, mode: DeactivationErrors) -> CacheResult<()> {
        match flag {
            ChangedFlag::Dirty => self.mark_changed()?,
            ChangedFlag::Clean => {
                self.force_up_to_date();
                self.deactivate_with(mode)?;
            }
            ChangedFlag::Unset => self.deactivate_with(mode)?,
        }
        Ok(())
    }

    /// Called by the coordinator after storing the object's state.
    pub fn mark_persisted(&mut self, serial: Serial) {
        self.serial = serial;
        if self.state == LifecycleState::Changed {
            self.state = LifecycleState::UpToDate;
        }
    }

    /// Hook run before a materialized field is read.
    pub fn before_read(&mut self) -> CacheResult<()> {
        self.ensure_materialized()?;
        self.record_access();
        Ok(())
    }

    /// Hook run before a field is written.
    pub fn before_write(&mut self, kind: FieldKind) -> CacheResult<()> {
        if kind == FieldKind::Lifecycle {
            return Ok(());
        }
        self.ensure_materialized()?;
        self.record_access();
        if kind == FieldKind::Persistent {
            self.mark_changed()?;
        }
        Ok(())
    }

    /// Materialize and return the state, for export to a serializer.
    pub fn materialized_state(&mut self) -> CacheResult<&S> {
        self.ensure_materialized()?;
        let oid = self.oid;
        self.data.as_ref().ok_or(CacheError::NotMaterialized(oid))
    }

    // ---- Transition primitives shared with the cache ----

    /// Move `Ghost → Loading` and return the coordinator to load from.
    pub(crate) fn begin_load(&mut self) -> Option<JarRef<S>> {
        if self.state != LifecycleState::Ghost {
            return None;
        }
        let jar = self.jar.clone()?;
        self.state = LifecycleState::Loading;
        Some(jar)
    }

    /// Complete a successful load. Transitions made reentrantly during the
    /// load (ghostified, pinned) are kept.
    pub(crate) fn finish_load(&mut self) -> Result<(), LoadError> {
        if self.state.is_materialized() && self.data.is_none() {
            return Err(LoadError::missing_state(self.oid));
        }
        if self.state == LifecycleState::Loading {
            self.state = LifecycleState::UpToDate;
        }
        Ok(())
    }

    pub(crate) fn install(&mut self, state: S) {
        self.data = Some(state);
    }

    pub(crate) fn discard_state(&mut self) {
        self.data = None;
        self.state = LifecycleState::Ghost;
    }

    /// Only clean objects are pinned; a changed object keeps its dirty flag.
    pub(crate) fn pin(&mut self) {
        if matches!(self.state, LifecycleState::UpToDate | LifecycleState::Loading) {
            self.state = LifecycleState::Sticky;
        }
    }

    pub(crate) fn force_up_to_date(&mut self) {
        if self.state.is_materialized() {
            self.state = LifecycleState::UpToDate;
        }
    }

    pub(crate) fn attach_to(&mut self, cache: CacheId) {
        self.cache = Some(cache);
    }

    /// The coordinator to notify if a voluntary deactivation may proceed.
    pub(crate) fn deactivation_jar(&self) -> Option<JarRef<S>> {
        if self.state == LifecycleState::UpToDate {
            self.jar.clone()
        } else {
            None
        }
    }

    pub(crate) fn settle_release(
        &mut self,
        outcome: Result<(), NotifyError>,
        mode: DeactivationErrors,
    ) -> Result<(), NotifyError> {
        match (outcome, mode) {
            (Ok(()), _) => Ok(()),
            (Err(err), DeactivationErrors::Record) => {
                warn!(oid = ?self.oid, error = %err, "release notification failed; recorded");
                self.recorded_error = Some(err);
                Ok(())
            }
            (Err(err), DeactivationErrors::Propagate) => Err(err),
        }
    }
}

impl<S> Default for PersistentObject<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for PersistentObject<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentObject")
            .field("oid", &self.oid)
            .field("state", &self.state)
            .field("serial", &self.serial)
            .field("has_jar", &self.jar.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::jar::Jar;
    use crate::memory::InMemoryJar;

    type Doc = Vec<u8>;

    fn setup(oid: u64) -> (Arc<InMemoryJar<Doc>>, PersistentObject<Doc>) {
        let jar = Arc::new(InMemoryJar::new());
        jar.store(Oid::from_u64(oid), b"stored".to_vec(), Serial::from_u64(9));
        let handle: JarRef<Doc> = jar.clone();
        (jar, PersistentObject::ghost(Oid::from_u64(oid), handle))
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn new_object_is_detached_ghost() {
        let obj: PersistentObject<Doc> = PersistentObject::new();
        assert!(obj.is_ghost());
        assert!(obj.oid().is_none());
        assert!(obj.jar().is_none());
        assert!(obj.cache_id().is_none());
        assert!(obj.serial().is_zero());
        assert_eq!(obj.changed(), None);
    }

    #[test]
    fn materialized_object_is_up_to_date() {
        let obj = PersistentObject::materialized(b"x".to_vec());
        assert_eq!(obj.state(), LifecycleState::UpToDate);
        assert_eq!(obj.data(), Some(&b"x".to_vec()));
        assert_eq!(obj.changed(), Some(false));
    }

    // -----------------------------------------------------------------------
    // Materialization
    // -----------------------------------------------------------------------

    #[test]
    fn ghost_without_jar_stays_ghost() {
        let mut obj: PersistentObject<Doc> = PersistentObject::new();
        obj.ensure_materialized().unwrap();
        assert!(obj.is_ghost());
    }

    #[test]
    fn ensure_materialized_loads_once() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        obj.ensure_materialized().unwrap();
        assert_eq!(obj.state(), LifecycleState::UpToDate);
        assert_eq!(obj.data(), Some(&b"stored".to_vec()));
        assert_eq!(obj.serial(), Serial::from_u64(9));
        assert_eq!(jar.load_count(), 1);
    }

    #[test]
    fn load_failure_leaves_ghost() {
        let (jar, mut obj) = setup(1);
        jar.fail_loads(true);
        let err = obj.ensure_materialized().unwrap_err();
        assert_eq!(err.oid, Some(Oid::from_u64(1)));
        assert!(obj.is_ghost());
        assert!(obj.data().is_none());
    }

    #[test]
    fn ghostify_then_reload_roundtrip() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        obj.ghostify();
        assert!(obj.is_ghost());
        assert!(obj.data().is_none());
        obj.ensure_materialized().unwrap();
        assert_eq!(obj.state(), LifecycleState::UpToDate);
        assert_eq!(jar.load_count(), 2);
    }

    struct SilentJar;

    impl Jar<Doc> for SilentJar {
        fn load_state(&self, _ctx: &mut LoadContext<'_, Doc>) -> Result<(), LoadError> {
            Ok(())
        }

        fn register_dirty(&self, _oid: Option<Oid>) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[test]
    fn load_without_install_is_a_failure() {
        let mut obj: PersistentObject<Doc> = PersistentObject::ghost(Oid::from_u64(3), Arc::new(SilentJar));
        let err = obj.ensure_materialized().unwrap_err();
        assert_eq!(err, LoadError::missing_state(Some(Oid::from_u64(3))));
        assert!(obj.is_ghost());
    }

    /// Touches the loading object before installing, as a setstate hook that
    /// reads its own attributes would.
    struct ReentrantJar {
        loads: std::sync::atomic::AtomicUsize,
    }

    impl Jar<Doc> for ReentrantJar {
        fn load_state(&self, ctx: &mut LoadContext<'_, Doc>) -> Result<(), LoadError> {
            self.loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            assert_eq!(ctx.state(), LifecycleState::Loading);
            ctx.before_read().map_err(|e| LoadError::new(ctx.oid(), e.to_string()))?;
            ctx.install(b"reentrant".to_vec());
            Ok(())
        }

        fn register_dirty(&self, _oid: Option<Oid>) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[test]
    fn reentrant_touch_does_not_recurse() {
        let jar = Arc::new(ReentrantJar {
            loads: Default::default(),
        });
        let mut obj: PersistentObject<Doc> = PersistentObject::ghost(Oid::from_u64(4), jar.clone());
        obj.before_read().unwrap();
        assert_eq!(obj.state(), LifecycleState::UpToDate);
        assert_eq!(jar.loads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // Change tracking
    // -----------------------------------------------------------------------

    #[test]
    fn mark_changed_registers_once() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        obj.mark_changed().unwrap();
        obj.mark_changed().unwrap();
        assert_eq!(obj.state(), LifecycleState::Changed);
        assert_eq!(obj.changed(), Some(true));
        assert_eq!(jar.register_count(), 1);
        assert_eq!(jar.registered(), vec![Some(Oid::from_u64(1))]);
    }

    #[test]
    fn mark_changed_on_ghost_is_noop() {
        let (jar, mut obj) = setup(1);
        obj.mark_changed().unwrap();
        assert!(obj.is_ghost());
        assert_eq!(jar.register_count(), 0);
    }

    #[test]
    fn mark_changed_failure_keeps_state() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        jar.fail_registrations(true);
        assert!(obj.mark_changed().is_err());
        assert_eq!(obj.state(), LifecycleState::UpToDate);
    }

    #[test]
    fn mark_changed_from_sticky() {
        let (jar, mut obj) = setup(1);
        obj.set_sticky().unwrap();
        obj.mark_changed().unwrap();
        assert_eq!(obj.state(), LifecycleState::Changed);
        assert_eq!(jar.register_count(), 1);
    }

    #[test]
    fn write_hooks_by_field_kind() {
        let (jar, mut obj) = setup(1);

        obj.before_write(FieldKind::Lifecycle).unwrap();
        assert!(obj.is_ghost());
        assert_eq!(jar.load_count(), 0);

        obj.before_write(FieldKind::Volatile).unwrap();
        assert_eq!(obj.state(), LifecycleState::UpToDate);
        assert_eq!(jar.register_count(), 0);

        obj.before_write(FieldKind::Persistent).unwrap();
        obj.before_write(FieldKind::Persistent).unwrap();
        assert_eq!(obj.state(), LifecycleState::Changed);
        assert_eq!(jar.register_count(), 1);
    }

    #[test]
    fn mark_persisted_returns_to_up_to_date() {
        let (_jar, mut obj) = setup(1);
        obj.before_write(FieldKind::Persistent).unwrap();
        obj.mark_persisted(Serial::from_u64(10));
        assert_eq!(obj.state(), LifecycleState::UpToDate);
        assert_eq!(obj.serial(), Serial::from_u64(10));
    }

    // -----------------------------------------------------------------------
    // Deactivation
    // -----------------------------------------------------------------------

    #[test]
    fn deactivate_only_from_up_to_date() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        obj.mark_changed().unwrap();
        obj.deactivate().unwrap();
        assert_eq!(obj.state(), LifecycleState::Changed);

        obj.mark_persisted(Serial::from_u64(2));
        obj.deactivate().unwrap();
        assert!(obj.is_ghost());
        assert_eq!(jar.release_count(), 1);
    }

    #[test]
    fn clean_flag_forgets_changed_object() {
        let (jar, mut obj) = setup(1);
        obj.before_write(FieldKind::Persistent).unwrap();
        assert_eq!(jar.register_count(), 1);

        obj.set_changed(ChangedFlag::Clean).unwrap();
        assert!(obj.is_ghost());
        assert_eq!(jar.register_count(), 1);
    }

    #[test]
    fn unset_flag_on_ghost_is_noop() {
        let (jar, mut obj) = setup(1);
        obj.set_changed(ChangedFlag::Unset).unwrap();
        assert!(obj.is_ghost());
        assert_eq!(jar.release_count(), 0);
    }

    #[test]
    fn dirty_flag_marks_changed() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        obj.set_changed(ChangedFlag::Dirty).unwrap();
        assert_eq!(obj.state(), LifecycleState::Changed);
        assert_eq!(jar.register_count(), 1);
    }

    #[test]
    fn release_failure_is_recorded_by_default() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        jar.fail_releases(true);
        obj.set_changed(ChangedFlag::Unset).unwrap();
        assert!(obj.is_ghost());
        let recorded = obj.take_recorded_error().expect("failure should be recorded");
        assert_eq!(recorded.oid, Some(Oid::from_u64(1)));
        assert!(obj.take_recorded_error().is_none());
    }

    #[test]
    fn release_failure_propagates_when_configured() {
        let (jar, mut obj) = setup(1);
        obj.ensure_materialized().unwrap();
        jar.fail_releases(true);
        let err = obj
            .set_changed_with(ChangedFlag::Clean, DeactivationErrors::Propagate)
            .unwrap_err();
        assert!(matches!(err, CacheError::Notify(_)));
        // Ghostification still completed.
        assert!(obj.is_ghost());
        assert!(obj.take_recorded_error().is_none());
    }

    #[test]
    fn sticky_blocks_deactivate_until_released() {
        let (_jar, mut obj) = setup(1);
        obj.set_sticky().unwrap();
        assert_eq!(obj.state(), LifecycleState::Sticky);
        obj.deactivate().unwrap();
        assert_eq!(obj.state(), LifecycleState::Sticky);
        obj.release_sticky();
        obj.deactivate().unwrap();
        assert!(obj.is_ghost());
    }

    #[test]
    fn sticky_keeps_changed_object_dirty() {
        let (jar, mut obj) = setup(1);
        obj.before_write(FieldKind::Persistent).unwrap();
        obj.set_sticky().unwrap();
        assert_eq!(obj.state(), LifecycleState::Changed);
        obj.release_sticky();
        obj.before_write(FieldKind::Persistent).unwrap();
        assert_eq!(obj.state(), LifecycleState::Changed);
        assert_eq!(jar.register_count(), 1);
    }

    #[test]
    fn sticky_on_jarless_ghost_stays_ghost() {
        let mut obj: PersistentObject<Doc> = PersistentObject::new();
        obj.set_sticky().unwrap();
        assert!(obj.is_ghost());
    }

    #[test]
    fn materialized_state_loads() {
        let (_jar, mut obj) = setup(1);
        assert_eq!(obj.materialized_state().unwrap(), &b"stored".to_vec());
    }

    #[test]
    fn materialized_state_of_jarless_ghost_fails() {
        let mut obj: PersistentObject<Doc> = PersistentObject::new();
        assert!(matches!(
            obj.materialized_state(),
            Err(CacheError::NotMaterialized(None))
        ));
    }

    // -----------------------------------------------------------------------
    // Lifecycle fields
    // -----------------------------------------------------------------------

    #[test]
    fn serial_accepts_only_eight_bytes() {
        let mut obj: PersistentObject<Doc> = PersistentObject::new();
        obj.set_serial(b"12345678").unwrap();
        assert_eq!(obj.serial().as_bytes(), b"12345678");

        let err = obj.set_serial(b"1234").unwrap_err();
        assert!(matches!(err, CacheError::InvalidSerialFormat(_)));
        assert_eq!(obj.serial().as_bytes(), b"12345678");

        obj.clear_serial();
        assert!(obj.serial().is_zero());
    }

    #[test]
    fn detached_identity_is_mutable() {
        let mut obj: PersistentObject<Doc> = PersistentObject::new();
        obj.set_oid(Some(Oid::from_u64(1))).unwrap();
        obj.set_oid(Some(Oid::from_u64(2))).unwrap();
        obj.set_oid(None).unwrap();
        assert!(obj.oid().is_none());
    }

    #[test]
    fn attached_identity_is_frozen() {
        let (jar, mut obj) = setup(1);
        obj.attach_to(CacheId::next());

        obj.set_oid(Some(Oid::from_u64(1))).unwrap();
        assert_eq!(
            obj.set_oid(Some(Oid::from_u64(2))).unwrap_err(),
            CacheError::AttachmentConflict(AttachmentConflict::ValueMismatch(AttachedField::Oid))
        );
        assert_eq!(
            obj.set_oid(None).unwrap_err(),
            CacheError::AttachmentConflict(AttachmentConflict::AlreadyAttached(AttachedField::Oid))
        );

        let same: JarRef<Doc> = jar.clone();
        obj.set_jar(Some(same)).unwrap();
        let other: JarRef<Doc> = Arc::new(InMemoryJar::new());
        assert_eq!(
            obj.set_jar(Some(other)).unwrap_err(),
            CacheError::AttachmentConflict(AttachmentConflict::ValueMismatch(AttachedField::Jar))
        );
        assert_eq!(
            obj.set_jar(None).unwrap_err(),
            CacheError::AttachmentConflict(AttachmentConflict::AlreadyAttached(AttachedField::Jar))
        );
    }

    #[test]
    fn debug_format() {
        let (_jar, obj) = setup(5);
        let debug = format!("{obj:?}");
        assert!(debug.contains("PersistentObject"));
        assert!(debug.contains("Ghost"));
    }
}
