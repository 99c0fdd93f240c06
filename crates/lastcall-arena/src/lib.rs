//! Bump-allocated defer scopes and standalone scope guards.
//!
//! # Architecture
//!
//! ```text
//! ScopeArena (caller-owned, reserved once, never grows)
//! └── bumpalo::Bump (record storage)
//!
//! DeferScope<'a> (one per function-level scope, borrows a ScopeArena)
//! ├── BumpRegion (byte accounting against the arena capacity)
//! ├── RecordChain → ClosureRecord[] (LIFO, inline up to 16 records)
//! ├── &dyn FallbackAllocator (optional, supplies storage once the arena is full)
//! └── &Cell<ReleaseReport> (optional, receives the release summary)
//!
//! ScopeGuard (one per block, single inline record)
//! ```
//!
//! Records are moved into arena or fallback memory, never boxed: a scope
//! that stays within its arena makes no heap calls after the arena is
//! created. Both scopes and guards release through `Drop`, so the chain
//! runs exactly once on every exit path: fall-through, early return, `?`,
//! and unwinding. Release order is strictly last-registered-first; nested
//! scopes release inner-to-outer.
//!
//! Unsafe code is confined to the private `raw` module.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod arena;
pub mod bump;
mod chain;
pub mod guard;
mod raw;
pub mod scope;

pub use arena::ScopeArena;
pub use chain::{ReleaseReport, INLINE_RECORDS};
pub use guard::{guard, on_exit, ScopeGuard};
pub use scope::{DeferScope, ScopeStats};
