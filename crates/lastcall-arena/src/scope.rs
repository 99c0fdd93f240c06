//! Function-level defer scope with a bump arena and LIFO release.
//!
//! A [`DeferScope`] is created at the top of a scope, borrowing a
//! [`ScopeArena`] declared just before it. Every registration moves its
//! record into the arena's storage, or into memory from the fallback
//! allocator once the arena is full. When the scope goes out of scope,
//! by fall-through, early return, `?`, or unwinding, `Drop` walks the
//! chain once in reverse registration order.
//!
//! There is no manual release: the chain is released exactly once by
//! `Drop`, and the borrow checker rules out registering afterwards.

use std::cell::Cell;

use bumpalo::Bump;
use lastcall_core::action::resume_contained_panic;
use lastcall_core::{
    ActionResult, Capture, DeferError, Deferred, FailureMode, FallbackAllocator, RecordHandle,
    RecordLayout, RecordSource, ScopeSite,
};

use crate::arena::ScopeArena;
use crate::bump::BumpRegion;
use crate::chain::{RecordChain, ReleaseReport};
use crate::raw::ClosureRecord;

/// Registration counters for a scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScopeStats {
    /// Records placed in the arena.
    pub arena_records: usize,
    /// Records placed with the fallback allocator.
    pub fallback_records: usize,
    /// Bytes bump-allocated.
    pub arena_bytes: usize,
    /// Bytes claimed from the fallback allocator.
    pub fallback_bytes: usize,
    /// Registrations refused in recoverable mode.
    pub refused: usize,
}

impl ScopeStats {
    /// Total records registered.
    pub fn records(&self) -> usize {
        self.arena_records + self.fallback_records
    }
}

/// Manager for the deferred actions of one scope.
///
/// # Example
///
/// ```
/// use lastcall_arena::{DeferScope, ScopeArena};
/// use lastcall_core::ScopeConfig;
/// use std::cell::RefCell;
///
/// let order = RefCell::new(Vec::<String>::new());
/// let mut arena = ScopeArena::new(ScopeConfig::new(128)).unwrap();
/// {
///     let mut scope = DeferScope::new(&mut arena, None);
///     scope.defer(|| order.borrow_mut().push("close file".into())).unwrap();
///     scope.defer_with(42, |fd| order.borrow_mut().push(format!("release fd {fd}"))).unwrap();
/// }
/// assert_eq!(*order.borrow(), ["release fd 42", "close file"]);
/// ```
#[must_use = "a defer scope releases its actions when dropped; bind it to a variable"]
pub struct DeferScope<'a> {
    site: ScopeSite,
    failure_mode: FailureMode,
    region: BumpRegion,
    storage: &'a Bump,
    chain: RecordChain<'a>,
    fallback: Option<&'a dyn FallbackAllocator>,
    stats: ScopeStats,
    report_sink: Option<&'a Cell<ReleaseReport>>,
}

impl<'a> DeferScope<'a> {
    /// Open a scope over `arena`, with an optional fallback allocator.
    ///
    /// The arena is emptied first and stays borrowed until the scope is
    /// dropped. Records the caller's location for diagnostics.
    #[track_caller]
    pub fn new(arena: &'a mut ScopeArena, fallback: Option<&'a dyn FallbackAllocator>) -> Self {
        let (config, storage) = arena.begin();
        Self {
            site: ScopeSite::here(config.label.clone()),
            failure_mode: config.failure_mode,
            region: BumpRegion::new(config.capacity),
            storage,
            chain: RecordChain::new(),
            fallback,
            stats: ScopeStats::default(),
            report_sink: None,
        }
    }

    /// Store the [`ReleaseReport`] in `sink` when the scope is released.
    ///
    /// The report is written before a held panic is resumed, so it is
    /// observable after `catch_unwind` as well.
    pub fn report_to(&mut self, sink: &'a Cell<ReleaseReport>) {
        self.report_sink = Some(sink);
    }

    /// Register an action with no captured values.
    pub fn defer<F, R>(&mut self, action: F) -> Result<RecordHandle, DeferError>
    where
        F: FnOnce() -> R + 'a,
        R: ActionResult,
    {
        self.defer_with((), move |()| action())
    }

    /// Register an action over a snapshot of `captured`.
    ///
    /// `captured` is moved into the record now; the action receives it
    /// unchanged at release. Use a tuple to capture several values and
    /// read them positionally (`args.0`) or by destructuring into
    /// names of your choice.
    ///
    /// On failure the action is dropped without running. In
    /// [`FailureMode::Fatal`] failure panics instead of returning.
    pub fn defer_with<T, F, R>(
        &mut self,
        captured: T,
        action: F,
    ) -> Result<RecordHandle, DeferError>
    where
        T: 'a,
        F: FnOnce(T) -> R + 'a,
        R: ActionResult,
    {
        let capture = Capture::new(captured, action);
        let layout = RecordLayout::of_val(&capture);
        let record = self.place(capture, layout)?;
        let handle = RecordHandle::new(self.chain.len(), record.footprint(), record.source());
        self.chain.push(record);
        Ok(handle)
    }

    /// Store one record: arena first, then fallback.
    fn place<D: Deferred + 'a>(
        &mut self,
        value: D,
        layout: RecordLayout,
    ) -> Result<ClosureRecord<'a>, DeferError> {
        let needed = layout.footprint();
        let value = match self.region.alloc(needed) {
            Some(offset) => match ClosureRecord::in_arena(self.storage, offset, layout, value) {
                Ok(record) => {
                    self.stats.arena_records += 1;
                    self.stats.arena_bytes += needed;
                    return Ok(record);
                }
                Err(value) => {
                    // Accounted room, but alignment padding left no storage.
                    self.region.rewind(offset);
                    value
                }
            },
            None => value,
        };

        let Some(fallback) = self.fallback else {
            drop(value);
            return self.fail(DeferError::ArenaExhausted {
                scope: self.site.to_string(),
                used: self.region.used(),
                remaining: self.region.remaining(),
                needed,
            });
        };

        match ClosureRecord::in_fallback(fallback, layout, value) {
            Ok(record) => {
                tracing::debug!(
                    scope = %self.site,
                    needed,
                    used = self.region.used(),
                    "arena full; record placed with fallback allocator"
                );
                self.stats.fallback_records += 1;
                self.stats.fallback_bytes += needed;
                Ok(record)
            }
            Err((value, reason)) => {
                drop(value);
                self.fail(DeferError::FallbackFailed {
                    scope: self.site.to_string(),
                    needed,
                    reason,
                })
            }
        }
    }

    /// Apply the configured failure policy.
    fn fail<T>(&mut self, err: DeferError) -> Result<T, DeferError> {
        match self.failure_mode {
            FailureMode::Recoverable => {
                self.stats.refused += 1;
                Err(err)
            }
            FailureMode::Fatal => {
                tracing::error!(scope = %self.site, error = %err, "defer registration failed");
                panic!("lastcall: {err}");
            }
        }
    }

    /// Number of records awaiting release.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether no records are registered.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Arena size in bytes.
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Arena bytes used so far.
    pub fn used(&self) -> usize {
        self.region.used()
    }

    /// Arena bytes left.
    pub fn remaining(&self) -> usize {
        self.region.remaining()
    }

    /// Registration counters.
    pub fn stats(&self) -> ScopeStats {
        self.stats
    }

    /// Failure policy in force.
    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Diagnostic name of the scope.
    pub fn site(&self) -> &ScopeSite {
        &self.site
    }

    /// Where the most recent registration was stored.
    pub fn head_source(&self) -> Option<RecordSource> {
        self.chain.head().map(ClosureRecord::source)
    }
}

impl Drop for DeferScope<'_> {
    fn drop(&mut self) {
        let (report, held_panic) = self.chain.drain(&self.site);
        if let Some(sink) = self.report_sink {
            sink.set(report);
        }
        if let Some(payload) = held_panic {
            resume_contained_panic(payload, &self.site);
        }
    }
}

impl std::fmt::Debug for DeferScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferScope")
            .field("site", &self.site)
            .field("failure_mode", &self.failure_mode)
            .field("region", &self.region)
            .field("records", &self.chain.len())
            .field("has_fallback", &self.fallback.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
