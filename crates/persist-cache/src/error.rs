//! Error types for object and cache operations.

use std::fmt;

use persist_types::{Oid, TypeError};
use thiserror::Error;

use crate::cache::ObjectKey;

fn describe(oid: &Option<Oid>) -> String {
    match oid {
        Some(oid) => oid.to_string(),
        None => "<unidentified object>".to_string(),
    }
}

/// The coordinator failed to produce an object's state.
///
/// The object is left as a ghost.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to load state of {}: {reason}", describe(.oid))]
pub struct LoadError {
    pub oid: Option<Oid>,
    pub reason: String,
}

impl LoadError {
    pub fn new(oid: Option<Oid>, reason: impl Into<String>) -> Self {
        Self {
            oid,
            reason: reason.into(),
        }
    }

    /// The coordinator reported success without installing any state.
    pub fn missing_state(oid: Option<Oid>) -> Self {
        Self::new(oid, "coordinator reported success without installing state")
    }
}

/// The coordinator failed to accept a notification about an object.
///
/// On a dirty registration the object's state is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("coordinator rejected notification for {}: {reason}", describe(.oid))]
pub struct NotifyError {
    pub oid: Option<Oid>,
    pub reason: String,
}

impl NotifyError {
    pub fn new(oid: Option<Oid>, reason: impl Into<String>) -> Self {
        Self {
            oid,
            reason: reason.into(),
        }
    }
}

/// Field of an object that is frozen once it joins a cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachedField {
    Oid,
    Jar,
}

impl fmt::Display for AttachedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oid => write!(f, "oid"),
            Self::Jar => write!(f, "jar"),
        }
    }
}

/// Violations of the attach-once rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttachmentConflict {
    /// Only objects with an identity can be registered.
    #[error("object has no oid and cannot be cached")]
    MissingIdentity,

    /// Another live object is registered under the same identity.
    #[error("oid {0} is already registered to another object")]
    IdentityInUse(Oid),

    /// The object already belongs to a different cache.
    #[error("object belongs to a different cache")]
    ForeignCache,

    /// Attempted to clear a field of an attached object.
    #[error("can't clear the {0} of a cached object")]
    AlreadyAttached(AttachedField),

    /// Attempted to replace a field of an attached object with a different value.
    #[error("can not change the {0} of a cached object")]
    ValueMismatch(AttachedField),
}

/// Errors from object and cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    AttachmentConflict(#[from] AttachmentConflict),

    /// A serial was set to something other than exactly 8 bytes.
    #[error("invalid serial format: {0}")]
    InvalidSerialFormat(#[from] TypeError),

    /// The key is stale or was never issued by this cache.
    #[error("unknown object key {0:?}")]
    UnknownObject(ObjectKey),

    /// The object is being loaded and cannot leave the cache.
    #[error("object {0:?} is loading and cannot be detached")]
    ObjectLoading(ObjectKey),

    /// The object is a ghost with no coordinator to load it from.
    #[error("object {} has no materialized state", describe(.0))]
    NotMaterialized(Option<Oid>),

    /// Configuration could not be parsed.
    #[error("invalid cache configuration: {0}")]
    Config(String),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
