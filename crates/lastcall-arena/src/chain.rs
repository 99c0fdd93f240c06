//! LIFO chain of closure records.
//!
//! The chain is a stack: the head is the most recently registered record
//! and each record's successor toward the tail is the one registered
//! before it. Chain entries live inline in the owning scope's stack frame
//! up to [`INLINE_RECORDS`]; longer chains spill to the heap.

use std::any::Any;

use smallvec::SmallVec;

use lastcall_core::action::{panic_message, ActionOutcome};
use lastcall_core::ScopeSite;

use crate::raw::ClosureRecord;

/// Records kept inline before the chain spills to the heap.
pub const INLINE_RECORDS: usize = 16;

/// Stack of registered records, most recent on top.
#[derive(Debug, Default)]
pub(crate) struct RecordChain<'a> {
    records: SmallVec<[ClosureRecord<'a>; INLINE_RECORDS]>,
}

/// Summary of one chain release.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Actions invoked (every record in the chain).
    pub invoked: usize,
    /// Actions that returned an error.
    pub failed: usize,
    /// Actions that panicked.
    pub panicked: usize,
    /// Records handed back to the fallback allocator.
    pub fallback_released: usize,
}

/// Panic payload held back until a release completes.
pub(crate) type HeldPanic = Box<dyn Any + Send + 'static>;

impl<'a> RecordChain<'a> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: ClosureRecord<'a>) {
        self.records.push(record);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recently registered record.
    pub(crate) fn head(&self) -> Option<&ClosureRecord<'a>> {
        self.records.last()
    }

    /// Release every record head to tail.
    ///
    /// Each action runs in isolation: an error is logged, the first panic
    /// is handed back for the caller to resume once the whole chain has
    /// run, later panics are logged and dropped. Fallback records go back
    /// to their allocator immediately after their own invocation.
    pub(crate) fn drain(&mut self, site: &ScopeSite) -> (ReleaseReport, Option<HeldPanic>) {
        let mut report = ReleaseReport::default();
        let mut first_panic = None;

        while let Some(record) = self.records.pop() {
            let released = record.release();
            match released.outcome {
                ActionOutcome::Completed => {}
                ActionOutcome::Failed(err) => {
                    report.failed += 1;
                    tracing::warn!(scope = %site, error = %err, "deferred action failed");
                }
                ActionOutcome::Panicked(payload) => {
                    report.panicked += 1;
                    if first_panic.is_none() {
                        first_panic = Some(payload);
                    } else {
                        tracing::warn!(
                            scope = %site,
                            panic = panic_message(payload.as_ref()),
                            "deferred action panicked after an earlier panic; dropping it"
                        );
                    }
                }
            }
            report.invoked += 1;
            if released.returned_block {
                report.fallback_released += 1;
            }
        }

        tracing::debug!(
            scope = %site,
            invoked = report.invoked,
            failed = report.failed,
            panicked = report.panicked,
            fallback_released = report.fallback_released,
            "released defer chain"
        );
        (report, first_panic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use lastcall_core::{Capture, HeapFallback, RecordLayout, RecordSource};
    use lastcall_test_utils::CallLog;

    fn arena_record<'a>(
        bump: &'a Bump,
        offset: usize,
        log: &'a CallLog,
        name: &'static str,
    ) -> ClosureRecord<'a> {
        let capture = Capture::new((), move |()| log.record(name));
        ClosureRecord::in_arena(bump, offset, RecordLayout::of_val(&capture), capture)
            .unwrap_or_else(|_| panic!("test arena has room"))
    }

    #[test]
    fn drain_runs_head_first() {
        let bump = Bump::with_capacity(256);
        let log = CallLog::new();
        let mut chain = RecordChain::new();
        chain.push(arena_record(&bump, 0, &log, "a"));
        chain.push(arena_record(&bump, 16, &log, "b"));
        chain.push(arena_record(&bump, 32, &log, "c"));
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.head().and_then(ClosureRecord::arena_offset), Some(32));

        let (report, panic) = chain.drain(&ScopeSite::here(None));
        assert!(panic.is_none());
        assert_eq!(log.entries(), ["c", "b", "a"]);
        assert_eq!(report.invoked, 3);
        assert_eq!(report.fallback_released, 0);
        assert!(chain.is_empty());
    }

    #[test]
    fn drain_returns_fallback_blocks() {
        let log = CallLog::new();
        let heap = HeapFallback::new();
        let capture = Capture::new((), |()| log.record("spilled"));
        let record =
            ClosureRecord::in_fallback(&heap, RecordLayout::of_val(&capture), capture)
                .unwrap_or_else(|_| panic!("heap fallback accepts"));
        assert_eq!(record.source(), RecordSource::Fallback);
        let mut chain = RecordChain::new();
        chain.push(record);
        assert_eq!(heap.live_blocks(), 1);

        let (report, _) = chain.drain(&ScopeSite::here(None));
        assert_eq!(report.fallback_released, 1);
        assert_eq!(heap.live_blocks(), 0);
        assert_eq!(log.entries(), ["spilled"]);
    }

    #[test]
    fn failed_action_does_not_stop_chain() {
        let bump = Bump::with_capacity(256);
        let log = CallLog::new();
        let mut chain = RecordChain::new();
        chain.push(arena_record(&bump, 0, &log, "first"));
        let failing = Capture::new((), |()| Err::<(), _>("disk full"));
        chain.push(
            ClosureRecord::in_arena(&bump, 16, RecordLayout::of_val(&failing), failing)
                .unwrap_or_else(|_| panic!("test arena has room")),
        );
        chain.push(arena_record(&bump, 24, &log, "last"));

        let (report, _) = chain.drain(&ScopeSite::here(None));
        assert_eq!(log.entries(), ["last", "first"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.invoked, 3);
    }

    #[test]
    fn first_panic_is_held_and_later_ones_dropped() {
        let bump = Bump::with_capacity(256);
        let log = CallLog::new();
        let mut chain = RecordChain::new();
        let early = Capture::new((), |()| -> () { panic!("registered first") });
        chain.push(
            ClosureRecord::in_arena(&bump, 0, RecordLayout::of_val(&early), early)
                .unwrap_or_else(|_| panic!("test arena has room")),
        );
        chain.push(arena_record(&bump, 8, &log, "middle"));
        let late = Capture::new((), |()| -> () { panic!("registered last") });
        chain.push(
            ClosureRecord::in_arena(&bump, 24, RecordLayout::of_val(&late), late)
                .unwrap_or_else(|_| panic!("test arena has room")),
        );

        let (report, panic) = chain.drain(&ScopeSite::here(None));
        assert_eq!(report.panicked, 2);
        assert_eq!(log.entries(), ["middle"]);
        let payload = panic.expect("a panic is held");
        assert_eq!(panic_message(payload.as_ref()), "registered last");
    }

    #[test]
    fn chain_spills_past_inline_capacity() {
        let bump = Bump::with_capacity(32 * (INLINE_RECORDS + 1));
        let log = CallLog::new();
        let mut chain = RecordChain::new();
        for i in 0..=INLINE_RECORDS {
            chain.push(arena_record(&bump, i * 32, &log, "x"));
        }
        assert!(chain.records.spilled());
        chain.drain(&ScopeSite::here(None));
        assert_eq!(log.len(), INLINE_RECORDS + 1);
    }
}
