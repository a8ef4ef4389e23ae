//! Foundation types for the persistent-object cache.
//!
//! Every other crate in the workspace depends on `persist-types`.
//!
//! # Key Types
//!
//! - [`Oid`]: 8-byte object identity assigned by the backing store
//! - [`Serial`]: opaque 8-byte version stamp of the last loaded state
//! - [`LifecycleState`]: ghost / loading / up-to-date / changed / sticky
//! - [`FieldKind`]: how an attribute write interacts with the state machine
//! - [`ChangedFlag`]: values the hosting layer may assign to "changed"

pub mod error;
pub mod oid;
pub mod serial;
pub mod state;

pub use error::TypeError;
pub use oid::Oid;
pub use serial::Serial;
pub use state::{ChangedFlag, FieldKind, LifecycleState};
