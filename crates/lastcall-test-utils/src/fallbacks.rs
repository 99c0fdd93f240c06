//! Instrumented fallback allocators.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};

use lastcall_core::{FallbackAllocator, FallbackBlock, FallbackError, HeapFallback};

use crate::CallLog;

/// One call observed by a [`RecordingFallback`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackEvent {
    Allocated { id: u64, size: usize },
    Released { id: u64, size: usize },
}

/// Unbounded heap fallback that records every call.
///
/// Optionally mirrors events into a shared [`CallLog`] as
/// `alloc#<id>` / `release#<id>` so they can be ordered against
/// deferred action invocations.
#[derive(Debug, Default)]
pub struct RecordingFallback {
    heap: HeapFallback,
    events: RefCell<Vec<FallbackEvent>>,
    timeline: Option<CallLog>,
}

impl RecordingFallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror events into `log`.
    pub fn with_log(log: CallLog) -> Self {
        Self {
            timeline: Some(log),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<FallbackEvent> {
        self.events.borrow().clone()
    }

    /// Blocks allocated and not yet released.
    pub fn outstanding(&self) -> usize {
        let events = self.events.borrow();
        let allocated = events
            .iter()
            .filter(|e| matches!(e, FallbackEvent::Allocated { .. }))
            .count();
        allocated - (events.len() - allocated)
    }

    /// Ids of released blocks, in release order.
    pub fn released_ids(&self) -> Vec<u64> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                FallbackEvent::Released { id, .. } => Some(*id),
                FallbackEvent::Allocated { .. } => None,
            })
            .collect()
    }
}

// SAFETY: every block comes from the inner `HeapFallback`.
unsafe impl FallbackAllocator for RecordingFallback {
    fn allocate(&self, layout: Layout) -> Result<FallbackBlock, FallbackError> {
        let block = self.heap.allocate(layout)?;
        let id = block.id();
        self.events.borrow_mut().push(FallbackEvent::Allocated {
            id,
            size: block.size(),
        });
        if let Some(log) = &self.timeline {
            log.record(format!("alloc#{id}"));
        }
        Ok(block)
    }

    unsafe fn release(&self, block: FallbackBlock) {
        let id = block.id();
        self.events.borrow_mut().push(FallbackEvent::Released {
            id,
            size: block.size(),
        });
        if let Some(log) = &self.timeline {
            log.record(format!("release#{id}"));
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.heap.release(block) }
    }
}

/// Fallback that refuses every request.
#[derive(Debug)]
pub struct FailingFallback {
    reason: String,
    attempts: Cell<usize>,
}

impl FailingFallback {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            attempts: Cell::new(0),
        }
    }

    /// Number of refused requests.
    pub fn attempts(&self) -> usize {
        self.attempts.get()
    }
}

// SAFETY: never hands out a block.
unsafe impl FallbackAllocator for FailingFallback {
    fn allocate(&self, _layout: Layout) -> Result<FallbackBlock, FallbackError> {
        self.attempts.set(self.attempts.get() + 1);
        Err(FallbackError::Refused {
            reason: self.reason.clone(),
        })
    }

    unsafe fn release(&self, block: FallbackBlock) {
        panic!("FailingFallback never allocates, but block {} was released", block.id());
    }
}
