//! Ghost-aware object cache for a persistent-object store.
//!
//! Objects live either as *ghosts* (identity and coordinator only) or
//! *materialized* (state loaded into memory). Materializing an object links
//! it into a recency ring owned by its [`Cache`]; eviction walks the ring
//! from its least recently used end and re-ghosts clean objects.
//!
//! # Lifecycle
//!
//! ```text
//!            ensure_materialized                 mark_changed
//!   Ghost ─────────► Loading ─────────► UpToDate ─────────────► Changed
//!     ▲                 │   load ok       │  ▲                     │
//!     │    load failed  │                 │  │ release_sticky      │ mark_persisted
//!     ├─────────────────┘       set_sticky│  │                     ▼
//!     │                                   ▼  │                  UpToDate
//!     └───── ghostify / deactivate ───── Sticky
//! ```
//!
//! # Components
//!
//! - [`PersistentObject`]: the per-object state machine
//! - [`Cache`]: slot arena, identity index, recency ring, eviction
//! - [`Jar`]: the coordinator that loads state and records dirty objects
//! - [`InMemoryJar`]: `HashMap`-backed coordinator for tests and embedding
//!
//! # Rules
//!
//! 1. An attached object is a ghost iff its slot is not linked into the ring.
//! 2. `non_ghost_count` always equals the number of linked slots.
//! 3. A materialized object registers with its coordinator at most once
//!    before the next commit/abort boundary.
//! 4. A failed load leaves a ghost; a failed registration leaves the state
//!    unchanged.
//! 5. There is no internal locking. Share a cache across threads through
//!    [`SharedCache`], one lock per cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod jar;
pub mod memory;
pub mod object;

pub use cache::{Cache, CacheId, ObjectKey, SharedCache};
pub use config::{CacheConfig, DeactivationErrors};
pub use error::{AttachedField, AttachmentConflict, CacheError, CacheResult, LoadError, NotifyError};
pub use jar::{same_jar, Jar, JarRef, LoadContext};
pub use memory::InMemoryJar;
pub use object::PersistentObject;
pub use persist_types::{ChangedFlag, FieldKind, LifecycleState, Oid, Serial};
