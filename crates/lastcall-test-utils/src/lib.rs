//! Test utilities and mock fallback allocators for lastcall development.
//!
//! - [`CallLog`]: ordered record of what ran, shareable by reference or clone.
//! - [`RecordingFallback`]: heap-style fallback that logs every allocate/release.
//! - [`FailingFallback`]: fallback that refuses every request.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fallbacks;

pub use fallbacks::{FailingFallback, FallbackEvent, RecordingFallback};

use std::cell::RefCell;
use std::rc::Rc;

/// Append-only log of named events, in the order they happened.
///
/// Clones share the same underlying log, so a fallback allocator and a
/// set of deferred actions can write into one timeline.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Index of the first entry equal to `entry`, if any.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.borrow().iter().position(|e| e == entry)
    }
}
