//! Heap traffic of registration and release.
//!
//! Counts calls into the global allocator on the current thread. Each
//! case runs once to warm up first, so lazily initialised state outside
//! the scope is not charged to it.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use lastcall::arena::INLINE_RECORDS;
use lastcall::prelude::*;

struct CountingAlloc;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

fn count_one() {
    let _ = ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        count_one();
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        count_one();
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        count_one();
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

fn two_arena_records(arena: &mut ScopeArena, sum: &Cell<u64>) {
    let mut scope = DeferScope::new(arena, None);
    let a = scope.defer_with(1u64, |v| sum.set(sum.get() * 10 + v)).unwrap();
    let b = scope.defer_with(2u64, |v| sum.set(sum.get() * 10 + v)).unwrap();
    assert_eq!(a.source(), RecordSource::Arena);
    assert_eq!(b.source(), RecordSource::Arena);
}

#[test]
fn arena_records_make_no_heap_calls() {
    let sum = Cell::new(0);
    let mut arena = ScopeArena::with_capacity(64).unwrap();
    two_arena_records(&mut arena, &sum);

    sum.set(0);
    let before = allocations();
    two_arena_records(&mut arena, &sum);
    assert_eq!(allocations() - before, 0);
    assert_eq!(sum.get(), 21);
}

#[test]
fn arena_full_of_records_makes_no_heap_calls() {
    let count = Cell::new(0usize);
    let mut arena = ScopeArena::with_capacity(16 * INLINE_RECORDS).unwrap();
    let fill = |arena: &mut ScopeArena| {
        let mut scope = DeferScope::new(arena, None);
        while scope.remaining() > 0 {
            scope.defer(|| count.set(count.get() + 1)).unwrap();
        }
        assert_eq!(scope.len(), INLINE_RECORDS);
    };
    fill(&mut arena);

    let before = allocations();
    fill(&mut arena);
    assert_eq!(allocations() - before, 0);
    assert_eq!(count.get(), 2 * INLINE_RECORDS);
}

#[test]
fn spilled_record_costs_one_fallback_allocation() {
    let sum = Cell::new(0u64);
    let heap = HeapFallback::new();
    let mut arena = ScopeArena::with_capacity(16).unwrap();
    let run = |arena: &mut ScopeArena| {
        let mut scope = DeferScope::new(arena, Some(&heap));
        let kept = scope.defer_with(1u64, |v| sum.set(sum.get() + v)).unwrap();
        let spilled = scope.defer_with(2u64, |v| sum.set(sum.get() + v)).unwrap();
        assert_eq!(kept.source(), RecordSource::Arena);
        assert_eq!(spilled.source(), RecordSource::Fallback);
        assert_eq!(heap.live_bytes(), spilled.footprint());
    };
    run(&mut arena);

    let before = allocations();
    let fallback_before = heap.total_allocations();
    run(&mut arena);
    assert_eq!(heap.total_allocations() - fallback_before, 1);
    assert_eq!(allocations() - before, 1);
    assert_eq!(heap.live_blocks(), 0);
    assert_eq!(sum.get(), 6);
}
