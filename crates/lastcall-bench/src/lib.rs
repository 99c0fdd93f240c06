//! Benchmark profiles for the lastcall defer runtime.
//!
//! - [`arena_profile`]: scope sized so every benchmark record stays in the arena
//! - [`overflow_profile`]: scope sized so all but `arena_records` records spill
//! - [`register_counters`]: registers `n` counter-bumping actions on a scope

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::cell::Cell;

use lastcall::types::RecordLayout;
use lastcall::{DeferScope, ScopeConfig};

/// Footprint of one counter action: a `&Cell<u64>` capture plus a `u64` payload.
pub fn counter_footprint() -> usize {
    RecordLayout::of::<(u64, &Cell<u64>)>().footprint()
}

/// Config whose arena holds `records` counter actions.
pub fn arena_profile(records: usize) -> ScopeConfig {
    ScopeConfig::new(records * counter_footprint()).with_label("bench_arena")
}

/// Config whose arena holds only `arena_records` counter actions.
pub fn overflow_profile(arena_records: usize) -> ScopeConfig {
    ScopeConfig::new(arena_records * counter_footprint()).with_label("bench_overflow")
}

/// Register `n` actions that each add their index to `sink`.
pub fn register_counters<'a>(scope: &mut DeferScope<'a>, sink: &'a Cell<u64>, n: usize) {
    for i in 0..n as u64 {
        if scope.defer_with(i, move |i| sink.set(sink.get() + i)).is_err() {
            return;
        }
    }
}

/// Sum the indices `0..n`, the value `register_counters` leaves in its sink.
pub fn expected_sum(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}
