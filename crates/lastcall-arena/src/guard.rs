//! Standalone single-record scope guards.
//!
//! A [`ScopeGuard`] is the degenerate one-record case of a defer scope:
//! the record is stored inline in the guard, so there is no arena, no
//! fallback, and creation cannot fail. It runs its action when the block
//! that owns it ends. Guards declared later in a block are dropped
//! first, so several guards release in LIFO order, and a guard inside a
//! nested block releases before anything in the enclosing block.

use std::panic::Location;

use lastcall_core::action::{invoke_isolated, resume_contained_panic, ActionOutcome};
use lastcall_core::{
    ActionResult, Capture, Deferred, RecordHandle, RecordLayout, RecordSource, ScopeSite,
};

/// Guard that runs one deferred action at scope exit.
#[must_use = "a scope guard runs its action when dropped; binding it to `_` drops it immediately"]
pub struct ScopeGuard<D: Deferred> {
    record: Option<D>,
    location: &'static Location<'static>,
}

impl<D: Deferred> ScopeGuard<D> {
    /// Wrap an already-built deferred action.
    #[track_caller]
    pub fn new(record: D) -> Self {
        Self {
            record: Some(record),
            location: Location::caller(),
        }
    }

    /// Registration receipt for the inline record.
    pub fn handle(&self) -> RecordHandle {
        let footprint = self
            .record
            .as_ref()
            .map_or(0, |record| RecordLayout::of_val(record).footprint());
        RecordHandle::new(0, footprint, RecordSource::Inline)
    }

    /// Where the guard was declared.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl<D: Deferred> Drop for ScopeGuard<D> {
    fn drop(&mut self) {
        let Some(record) = self.record.take() else {
            return;
        };
        match invoke_isolated(|| record.run()) {
            ActionOutcome::Completed => {}
            ActionOutcome::Failed(err) => {
                tracing::warn!(guard = %self.location, error = %err, "scope guard action failed");
            }
            ActionOutcome::Panicked(payload) => {
                resume_contained_panic(payload, &ScopeSite::new(None, self.location));
            }
        }
    }
}

impl<D: Deferred> std::fmt::Debug for ScopeGuard<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("location", &self.location)
            .field("armed", &self.record.is_some())
            .finish()
    }
}

/// Run `action` over a snapshot of `captured` when the guard is dropped.
///
/// ```
/// use lastcall_arena::guard;
/// use std::cell::Cell;
///
/// let closed = Cell::new(0);
/// {
///     let fd = 3;
///     let _g = guard(fd, |fd| closed.set(fd));
/// }
/// assert_eq!(closed.get(), 3);
/// ```
#[track_caller]
pub fn guard<T, F, R>(captured: T, action: F) -> ScopeGuard<Capture<T, F>>
where
    F: FnOnce(T) -> R,
    R: ActionResult,
{
    ScopeGuard::new(Capture::new(captured, action))
}

/// Run `action` when the guard is dropped, capturing nothing up front.
#[track_caller]
pub fn on_exit<F, R>(action: F) -> ScopeGuard<impl Deferred>
where
    F: FnOnce() -> R,
    R: ActionResult,
{
    ScopeGuard::new(Capture::new((), move |()| action()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lastcall_test_utils::CallLog;

    #[test]
    fn runs_once_at_block_exit() {
        let log = CallLog::new();
        {
            let _g = on_exit(|| log.record("exit"));
            assert!(log.is_empty());
        }
        assert_eq!(log.entries(), ["exit"]);
    }

    #[test]
    fn sibling_guards_release_lifo() {
        let log = CallLog::new();
        {
            let _first = on_exit(|| log.record("first"));
            let _second = on_exit(|| log.record("second"));
            let _third = guard(3, |n| log.record(format!("third:{n}")));
        }
        assert_eq!(log.entries(), ["third:3", "second", "first"]);
    }

    #[test]
    fn nested_guards_release_inner_first() {
        let log = CallLog::new();
        {
            let _outer = on_exit(|| log.record("outer"));
            {
                let _inner = on_exit(|| log.record("inner"));
                {
                    let _innermost = on_exit(|| log.record("innermost"));
                }
                log.record("between");
            }
        }
        assert_eq!(log.entries(), ["innermost", "between", "inner", "outer"]);
    }

    #[test]
    fn captured_values_are_snapshots() {
        let log = CallLog::new();
        {
            let mut age = 30;
            let _g = guard((100, "sdada", age), |(a, s, age)| {
                log.record(format!("{a} {s} {age}"))
            });
            age = 40;
            assert_eq!(age, 40);
        }
        assert_eq!(log.entries(), ["100 sdada 30"]);
    }

    #[test]
    fn failing_action_is_contained() {
        let log = CallLog::new();
        {
            let _after = on_exit(|| log.record("still runs"));
            let _g = on_exit(|| Err::<(), _>("cannot flush"));
        }
        assert_eq!(log.entries(), ["still runs"]);
    }

    #[test]
    fn panicking_guard_resumes_after_drop() {
        let log = CallLog::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _after = on_exit(|| log.record("outer cleanup"));
            let _g = on_exit::<_, ()>(|| panic!("guard blew up"));
        }));
        assert!(result.is_err());
        assert_eq!(log.entries(), ["outer cleanup"]);
    }

    #[test]
    fn guard_runs_during_unwinding() {
        let log = CallLog::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g = on_exit(|| log.record("unwound"));
            panic!("body failed");
        }));
        assert!(result.is_err());
        assert_eq!(log.entries(), ["unwound"]);
    }

    #[test]
    fn handle_reports_inline_record() {
        let log = CallLog::new();
        let g = guard(1u64, |v| log.record(v.to_string()));
        let handle = g.handle();
        assert_eq!(handle.source(), RecordSource::Inline);
        assert_eq!(handle.footprint(), 24);
        assert!(g.location().file().ends_with("guard.rs"));
        drop(g);
        assert_eq!(log.entries(), ["1"]);
    }
}
