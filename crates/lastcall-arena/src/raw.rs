//! Placement of deferred records into arena and fallback memory.
//!
//! A [`ClosureRecord`] is a `D: Deferred` moved into storage the record
//! does not own, plus the two monomorphised entry points that consume or
//! drop it in place. Arena records live in a [`Bump`] borrowed for the
//! record's lifetime; fallback records live in a [`FallbackBlock`] that
//! goes back to its allocator right after the action has run.
//!
//! Every `unsafe` block in this crate is in this module.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::mem::{self, ManuallyDrop};
use std::ptr::NonNull;

use bumpalo::Bump;
use lastcall_core::action::{invoke_isolated, ActionOutcome};
use lastcall_core::{
    ActionError, Deferred, FallbackAllocator, FallbackBlock, FallbackError, RecordLayout,
    RecordSource,
};

/// An initialised `D` at `ptr`, erased to its entry points.
struct Slot {
    ptr: NonNull<u8>,
    invoke: unsafe fn(NonNull<u8>) -> Result<(), ActionError>,
    discard: unsafe fn(NonNull<u8>),
}

unsafe fn invoke_in_place<D: Deferred>(ptr: NonNull<u8>) -> Result<(), ActionError> {
    // SAFETY: `ptr` holds an initialised `D` that is read exactly once;
    // the slot is forgotten by `Slot::invoke` so it is never dropped.
    let record = unsafe { ptr.cast::<D>().as_ptr().read() };
    record.run()
}

unsafe fn discard_in_place<D>(ptr: NonNull<u8>) {
    // SAFETY: `ptr` holds an initialised `D` that was never invoked.
    unsafe { ptr.cast::<D>().as_ptr().drop_in_place() }
}

fn holds<D>(layout: Layout) -> bool {
    layout.size() >= mem::size_of::<D>() && layout.align() >= mem::align_of::<D>()
}

impl Slot {
    /// Move `value` into `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of a `D`, aligned for `D`, and stay
    /// valid and otherwise unused until the slot is invoked or dropped.
    unsafe fn write<D: Deferred>(ptr: NonNull<u8>, value: D) -> Self {
        // SAFETY: upheld by the caller.
        unsafe { ptr.cast::<D>().as_ptr().write(value) };
        Self {
            ptr,
            invoke: invoke_in_place::<D>,
            discard: discard_in_place::<D>,
        }
    }

    fn invoke(self) -> Result<(), ActionError> {
        let slot = ManuallyDrop::new(self);
        // SAFETY: the slot holds an initialised record, consumed here once.
        unsafe { (slot.invoke)(slot.ptr) }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        // SAFETY: a slot that is dropped was never invoked.
        unsafe { (self.discard)(self.ptr) }
    }
}

enum Storage<'a> {
    /// Inside a bump arena borrowed for `'a`; reclaimed with the arena.
    Arena { offset: usize },
    /// Inside a block owned by `allocator` until released.
    Fallback {
        block: FallbackBlock,
        allocator: &'a dyn FallbackAllocator,
    },
}

/// A registered deferred action awaiting release.
///
/// Dropping a record without [`release`](Self::release) drops its payload
/// without running it; a fallback block dropped that way is leaked.
pub(crate) struct ClosureRecord<'a> {
    slot: Slot,
    footprint: usize,
    storage: Storage<'a>,
}

/// How releasing one record went.
pub(crate) struct Released {
    /// Result of the action.
    pub(crate) outcome: ActionOutcome,
    /// Whether a fallback block went back to its allocator.
    pub(crate) returned_block: bool,
}

impl<'a> ClosureRecord<'a> {
    /// Move `value` into `bump`, recording its arena `offset`.
    ///
    /// Hands `value` back if the arena has no room for `layout`.
    pub(crate) fn in_arena<D: Deferred + 'a>(
        bump: &'a Bump,
        offset: usize,
        layout: RecordLayout,
        value: D,
    ) -> Result<Self, D> {
        let storage = layout.storage();
        if !holds::<D>(storage) {
            return Err(value);
        }
        let Ok(ptr) = bump.try_alloc_layout(storage) else {
            return Err(value);
        };
        // SAFETY: `ptr` is a fresh bump allocation sized and aligned for
        // `D`. The arena is borrowed for `'a` and cannot be reset or
        // dropped while this record exists.
        let slot = unsafe { Slot::write(ptr, value) };
        Ok(Self {
            slot,
            footprint: layout.footprint(),
            storage: Storage::Arena { offset },
        })
    }

    /// Move `value` into a block from `allocator`.
    ///
    /// Hands `value` back with the allocator's reason on refusal.
    pub(crate) fn in_fallback<D: Deferred + 'a>(
        allocator: &'a dyn FallbackAllocator,
        layout: RecordLayout,
        value: D,
    ) -> Result<Self, (D, FallbackError)> {
        let block = match allocator.allocate(layout.storage()) {
            Ok(block) => block,
            Err(reason) => return Err((value, reason)),
        };
        if !holds::<D>(block.layout()) {
            let reason = FallbackError::Refused {
                reason: format!(
                    "block of {} bytes aligned to {} cannot hold the record",
                    block.size(),
                    block.layout().align()
                ),
            };
            // SAFETY: the block came from `allocator` and was never used.
            unsafe { allocator.release(block) };
            return Err((value, reason));
        }
        // SAFETY: the block is sized and aligned for `D` and stays valid
        // until `release` returns it, after the slot has been consumed.
        let slot = unsafe { Slot::write(block.ptr(), value) };
        Ok(Self {
            slot,
            footprint: layout.footprint(),
            storage: Storage::Fallback { block, allocator },
        })
    }

    /// Bytes charged for the record.
    pub(crate) fn footprint(&self) -> usize {
        self.footprint
    }

    /// Which allocator holds the record.
    pub(crate) fn source(&self) -> RecordSource {
        match self.storage {
            Storage::Arena { .. } => RecordSource::Arena,
            Storage::Fallback { .. } => RecordSource::Fallback,
        }
    }

    /// Arena offset, for arena records.
    pub(crate) fn arena_offset(&self) -> Option<usize> {
        match self.storage {
            Storage::Arena { offset } => Some(offset),
            Storage::Fallback { .. } => None,
        }
    }

    /// Run the action in isolation, then return fallback storage.
    pub(crate) fn release(self) -> Released {
        let Self { slot, storage, .. } = self;
        let outcome = invoke_isolated(|| slot.invoke());
        let returned_block = match storage {
            Storage::Arena { .. } => false,
            Storage::Fallback { block, allocator } => {
                // SAFETY: the record was read out of the block above and
                // the block came from this allocator.
                unsafe { allocator.release(block) };
                true
            }
        };
        Released {
            outcome,
            returned_block,
        }
    }
}

impl fmt::Debug for ClosureRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("ClosureRecord");
        out.field("source", &self.source())
            .field("footprint", &self.footprint);
        match &self.storage {
            Storage::Arena { offset } => out.field("offset", offset),
            Storage::Fallback { block, .. } => out.field("block", &block.id()),
        };
        out.finish_non_exhaustive()
    }
}
