//! Fallback allocator interface and stock implementations.
//!
//! A scope consults its fallback only when its arena cannot fit a record.
//! The allocator hands out a [`FallbackBlock`], real memory the record is
//! moved into, and gets it back through [`FallbackAllocator::release`]
//! exactly once, right after the record's action has run.
//!
//! Methods take `&self` so one allocator can back many scopes; stateful
//! implementations use interior mutability. [`HeapFallback`] adapts any
//! [`allocator_api2::alloc::Allocator`], so pools and custom heaps plug in
//! without a bespoke implementation.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;

use allocator_api2::alloc::{Allocator, Global};

use crate::error::FallbackError;

/// Memory handed out by a [`FallbackAllocator`].
///
/// Not `Clone`: a block is released at most once by construction.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct FallbackBlock {
    id: u64,
    ptr: NonNull<u8>,
    layout: Layout,
}

impl FallbackBlock {
    /// Describe `layout`-shaped memory at `ptr`. Only allocators should mint blocks.
    pub fn new(id: u64, ptr: NonNull<u8>, layout: Layout) -> Self {
        Self { id, ptr, layout }
    }

    /// Allocator-assigned identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start of the block.
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size and alignment the block is valid for.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Bytes covered by the block.
    pub fn size(&self) -> usize {
        self.layout.size()
    }
}

/// Allocator consulted when a scope's arena is exhausted.
///
/// # Safety
///
/// A block returned by [`allocate`](Self::allocate) must point to memory
/// valid for reads and writes of `block.layout().size()` bytes, aligned to
/// `block.layout().align()`, not overlapping any other live block, and it
/// must stay valid until the block is passed to [`release`](Self::release).
pub unsafe trait FallbackAllocator {
    /// Hand out memory for one record.
    fn allocate(&self, layout: Layout) -> Result<FallbackBlock, FallbackError>;

    /// Take back a block.
    ///
    /// # Safety
    ///
    /// `block` must come from [`allocate`](Self::allocate) on this same
    /// allocator, and nothing may read or write its memory afterwards.
    unsafe fn release(&self, block: FallbackBlock);
}

unsafe impl<A: FallbackAllocator + ?Sized> FallbackAllocator for &A {
    fn allocate(&self, layout: Layout) -> Result<FallbackBlock, FallbackError> {
        (**self).allocate(layout)
    }

    unsafe fn release(&self, block: FallbackBlock) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).release(block) }
    }
}

/// Unbounded fallback backed by an [`Allocator`], the global heap by default.
///
/// Keeps the books alongside: live blocks, live bytes, and lifetime totals.
#[derive(Debug)]
pub struct HeapFallback<A: Allocator = Global> {
    alloc: A,
    next_id: Cell<u64>,
    live_blocks: Cell<usize>,
    live_bytes: Cell<usize>,
    total_allocations: Cell<u64>,
}

impl HeapFallback {
    /// Create an allocator over the global heap.
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

impl Default for HeapFallback {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Allocator> HeapFallback<A> {
    /// Create an allocator drawing from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            alloc,
            next_id: Cell::new(0),
            live_blocks: Cell::new(0),
            live_bytes: Cell::new(0),
            total_allocations: Cell::new(0),
        }
    }

    /// Blocks handed out and not yet released.
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.get()
    }

    /// Bytes handed out and not yet released.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// Blocks handed out over the allocator's lifetime.
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations.get()
    }
}

// SAFETY: blocks are fresh `Allocator::allocate` results of the requested
// layout and are only deallocated in `release`.
unsafe impl<A: Allocator> FallbackAllocator for HeapFallback<A> {
    fn allocate(&self, layout: Layout) -> Result<FallbackBlock, FallbackError> {
        let ptr = self
            .alloc
            .allocate(layout)
            .map_err(|_| FallbackError::Refused {
                reason: format!("allocator could not supply {} bytes", layout.size()),
            })?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.live_blocks.set(self.live_blocks.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + layout.size());
        self.total_allocations.set(self.total_allocations.get() + 1);
        Ok(FallbackBlock::new(id, ptr.cast(), layout))
    }

    unsafe fn release(&self, block: FallbackBlock) {
        self.live_blocks.set(self.live_blocks.get().saturating_sub(1));
        self.live_bytes
            .set(self.live_bytes.get().saturating_sub(block.size()));
        // SAFETY: the caller returns a block this allocator produced, with
        // the layout it was allocated with.
        unsafe { self.alloc.deallocate(block.ptr(), block.layout()) }
    }
}

/// Fallback with a fixed byte budget over the global heap.
///
/// Refuses any request that would push live bytes past the budget.
/// Released blocks return their bytes to the budget.
#[derive(Debug)]
pub struct BoundedFallback {
    budget: usize,
    in_use: Cell<usize>,
    heap: HeapFallback,
}

impl BoundedFallback {
    /// Create an allocator with `budget` bytes.
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            in_use: Cell::new(0),
            heap: HeapFallback::new(),
        }
    }

    /// Total budget in bytes.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Bytes currently claimed.
    pub fn in_use(&self) -> usize {
        self.in_use.get()
    }

    /// Bytes still available.
    pub fn available(&self) -> usize {
        self.budget - self.in_use.get()
    }
}

// SAFETY: every block comes from the inner `HeapFallback`.
unsafe impl FallbackAllocator for BoundedFallback {
    fn allocate(&self, layout: Layout) -> Result<FallbackBlock, FallbackError> {
        let available = self.available();
        if layout.size() > available {
            return Err(FallbackError::OutOfMemory {
                requested: layout.size(),
                available,
            });
        }
        let block = self.heap.allocate(layout)?;
        self.in_use.set(self.in_use.get() + block.size());
        Ok(block)
    }

    unsafe fn release(&self, block: FallbackBlock) {
        self.in_use.set(self.in_use.get().saturating_sub(block.size()));
        // SAFETY: forwarded caller contract; the block came from `self.heap`.
        unsafe { self.heap.release(block) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    #[test]
    fn heap_fallback_hands_out_writable_memory() {
        let heap = HeapFallback::new();
        let block = heap.allocate(bytes(16)).unwrap();
        assert_eq!(block.ptr().as_ptr() as usize % 8, 0);
        let slot = block.ptr().cast::<u64>();
        unsafe {
            slot.as_ptr().write(0xdead_beef);
            assert_eq!(slot.as_ptr().read(), 0xdead_beef);
            heap.release(block);
        }
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn heap_fallback_tracks_live_blocks() {
        let heap = HeapFallback::new();
        let a = heap.allocate(bytes(32)).unwrap();
        let b = heap.allocate(bytes(16)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.ptr(), b.ptr());
        assert_eq!(heap.live_blocks(), 2);
        assert_eq!(heap.live_bytes(), 48);

        unsafe { heap.release(a) };
        assert_eq!(heap.live_blocks(), 1);
        assert_eq!(heap.live_bytes(), 16);
        unsafe { heap.release(b) };
        assert_eq!(heap.live_blocks(), 0);
        assert_eq!(heap.total_allocations(), 2);
    }

    #[test]
    fn heap_fallback_over_custom_allocator() {
        let heap = HeapFallback::new_in(Global);
        let block = heap.allocate(bytes(24)).unwrap();
        assert_eq!(block.size(), 24);
        unsafe { heap.release(block) };
        assert_eq!(heap.live_bytes(), 0);
    }

    #[test]
    fn bounded_fallback_refuses_past_budget() {
        let bounded = BoundedFallback::new(40);
        let a = bounded.allocate(bytes(32)).unwrap();
        let err = bounded.allocate(bytes(16)).unwrap_err();
        assert_eq!(
            err,
            FallbackError::OutOfMemory {
                requested: 16,
                available: 8,
            }
        );
        unsafe { bounded.release(a) };
        assert_eq!(bounded.available(), 40);
        let b = bounded.allocate(bytes(16)).unwrap();
        assert_eq!(bounded.in_use(), 16);
        unsafe { bounded.release(b) };
    }

    #[test]
    fn reference_forwards_to_allocator() {
        let heap = HeapFallback::new();
        let by_ref: &dyn FallbackAllocator = &heap;
        let block = (&by_ref).allocate(bytes(8)).unwrap();
        assert_eq!(block.size(), 8);
        unsafe { by_ref.release(block) };
        assert_eq!(heap.live_blocks(), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn bounded_in_use_never_exceeds_budget(
                budget in 0usize..512,
                sizes in proptest::collection::vec(1usize..128, 0..32),
            ) {
                let bounded = BoundedFallback::new(budget);
                let mut held = Vec::new();
                for size in sizes {
                    if let Ok(block) = bounded.allocate(bytes(size)) {
                        held.push(block);
                    }
                    prop_assert!(bounded.in_use() <= budget);
                }
                let claimed: usize = held.iter().map(FallbackBlock::size).sum();
                prop_assert_eq!(claimed, bounded.in_use());
                for block in held {
                    unsafe { bounded.release(block) };
                }
                prop_assert_eq!(bounded.in_use(), 0);
            }
        }
    }
}
