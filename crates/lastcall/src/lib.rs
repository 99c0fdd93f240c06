//! lastcall: deterministic, ordered cleanup at scope exit.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the lastcall sub-crates. For most users, adding `lastcall` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use lastcall::prelude::*;
//! use std::cell::RefCell;
//!
//! let log = RefCell::new(Vec::new());
//!
//! fn work(log: &RefCell<Vec<String>>) -> Result<(), DeferError> {
//!     let mut arena = ScopeArena::new(ScopeConfig::new(128))?;
//!     let mut scope = DeferScope::new(&mut arena, None);
//!
//!     let path = String::from("/tmp/cache");
//!     let fd = 7;
//!     defer!(scope, [path, fd] => {
//!         log.borrow_mut().push(format!("close {fd} ({path})"));
//!     })?;
//!     defer!(scope, [handle = fd + 1] => {
//!         log.borrow_mut().push(format!("unlock {handle}"));
//!     })?;
//!
//!     {
//!         scope_exit!({ log.borrow_mut().push("inner block done".to_string()); });
//!     }
//!     Ok(())
//! }
//!
//! work(&log).unwrap();
//! assert_eq!(
//!     *log.borrow(),
//!     ["inner block done", "unlock 8", "close 7 (/tmp/cache)"]
//! );
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `lastcall-core` | Record format, fallback trait, config, errors |
//! | [`arena`] | `lastcall-arena` | `ScopeArena`, `DeferScope`, `ScopeGuard`, release reports |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod macros;

/// Record format, fallback allocators, configuration, and errors (`lastcall-core`).
pub use lastcall_core as types;

/// Defer scopes, scope guards, and the release chain (`lastcall-arena`).
pub use lastcall_arena as arena;

pub use lastcall_arena::{
    guard, on_exit, DeferScope, ReleaseReport, ScopeArena, ScopeGuard, ScopeStats,
};
pub use lastcall_core::{
    BoundedFallback, DeferError, FailureMode, FallbackAllocator, FallbackBlock, FallbackError,
    HeapFallback, RecordHandle, RecordSource, ScopeConfig,
};

/// Common imports for code that registers deferred actions.
pub mod prelude {
    pub use crate::{defer, scope_exit};
    pub use lastcall_arena::{guard, on_exit, DeferScope, ScopeArena, ScopeGuard};
    pub use lastcall_core::{
        DeferError, FailureMode, FallbackAllocator, HeapFallback, RecordSource, ScopeConfig,
    };
}
