use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a persistent object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No materialized state; only identity and coordinator remain.
    #[default]
    Ghost,
    /// The coordinator is populating state right now. Reentrant accesses
    /// to the object treat it as materialized and never trigger a second load.
    Loading,
    /// Materialized and matching the last known serial.
    UpToDate,
    /// Materialized and registered as dirty with the coordinator.
    Changed,
    /// Materialized and pinned against ghostification.
    Sticky,
}

impl LifecycleState {
    /// Numeric code: -1 ghost, 0 up-to-date, 1 changed, 2 sticky, 3 loading.
    pub fn code(self) -> i8 {
        match self {
            Self::Ghost => -1,
            Self::UpToDate => 0,
            Self::Changed => 1,
            Self::Sticky => 2,
            Self::Loading => 3,
        }
    }

    /// Returns `true` for every state except [`LifecycleState::Ghost`].
    pub fn is_materialized(self) -> bool {
        !matches!(self, Self::Ghost)
    }

    /// Only clean, unpinned objects may be evicted.
    pub fn is_evictable(self) -> bool {
        matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ghost => write!(f, "ghost"),
            Self::Loading => write!(f, "loading"),
            Self::UpToDate => write!(f, "up-to-date"),
            Self::Changed => write!(f, "changed"),
            Self::Sticky => write!(f, "sticky"),
        }
    }
}

/// Classification of an attribute for the write hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Identity, coordinator or serial: never materializes the object.
    Lifecycle,
    /// Transient field: materializes but is not tracked as a change.
    Volatile,
    /// Ordinary state field: materializes and marks the object changed.
    Persistent,
}

/// Value assigned to an object's "changed" attribute by the hosting layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangedFlag {
    /// `true`: register the object as dirty.
    Dirty,
    /// `false`: forget the object's state, even unsaved changes.
    Clean,
    /// absent / none: deactivate if the object is up to date.
    Unset,
}

impl From<Option<bool>> for ChangedFlag {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Dirty,
            Some(false) => Self::Clean,
            None => Self::Unset,
        }
    }
}
