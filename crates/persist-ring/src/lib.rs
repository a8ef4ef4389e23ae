//! Recency ring for the persistent-object cache.
//!
//! The ring is an intrusive doubly-linked list threaded through the cache's
//! slot arena. Links are slot indices rather than pointers, so the ring never
//! owns the objects it orders; the arena does.
//!
//! ```text
//!   head (most recent)                        tail (least recent)
//!     │                                          │
//!     ▼                                          ▼
//!   [ 4 ] ──next──► [ 0 ] ──next──► [ 7 ] ──next──► None
//!   None ◄──prev── [ 4 ] ◄──prev── [ 0 ] ◄──prev── [ 7 ]
//! ```
//!
//! # Rules
//!
//! 1. A slot is linked iff it has a `Some` entry in the link table.
//! 2. `add_to_head` on a linked slot, and `remove`/`move_to_head` on an
//!    unlinked slot, are internal-consistency faults and panic.
//! 3. Every operation except iteration is O(1).

pub mod ring;

pub use ring::{Iter, Ring, Slot};
