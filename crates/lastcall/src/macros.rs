//! Capture-list macros over [`DeferScope`](crate::DeferScope) and
//! [`guard`](crate::guard).
//!
//! Both macros take an optional capture list in brackets. Each entry is
//! either `name`, which snapshots the variable `name` under the same
//! name, or `alias = expr`, which snapshots `expr` under `alias`. The
//! body sees only the snapshots for listed names, never later changes to
//! the originals.

/// Register a deferred action on a [`DeferScope`](crate::DeferScope).
///
/// Evaluates to the registration `Result<RecordHandle, DeferError>`.
///
/// ```
/// use lastcall::prelude::*;
/// use std::cell::Cell;
///
/// let total = Cell::new(0);
/// let mut arena = ScopeArena::with_capacity(64).unwrap();
/// {
///     let mut scope = DeferScope::new(&mut arena, None);
///     let mut n = 2;
///     defer!(scope, [n, doubled = n * 2] => { total.set(total.get() + n + doubled); }).unwrap();
///     n = 100;
///     defer!(scope, { total.set(total.get() * 10); }).unwrap();
///     assert_eq!(n, 100);
/// }
/// assert_eq!(total.get(), 6);
/// ```
#[macro_export]
macro_rules! defer {
    ($scope:expr, [$($name:ident $(= $value:expr)?),* $(,)?] => $body:block) => {
        $scope.defer_with(
            ($($crate::__capture_value!($name $(= $value)?),)*),
            |($($name,)*)| $body,
        )
    };
    ($scope:expr, $body:block) => {
        $scope.defer(|| $body)
    };
}

/// Run a block when the enclosing block exits, via a [`ScopeGuard`](crate::ScopeGuard).
///
/// Expands to a hidden `let` binding, so the guard lives until the end
/// of the block the macro is written in.
///
/// ```
/// use lastcall::prelude::*;
/// use std::cell::RefCell;
///
/// let log = RefCell::new(Vec::new());
/// {
///     let name = "socket";
///     scope_exit!([name] => { log.borrow_mut().push(format!("close {name}")); });
///     scope_exit!({ log.borrow_mut().push("flush".to_string()); });
/// }
/// assert_eq!(*log.borrow(), ["flush", "close socket"]);
/// ```
#[macro_export]
macro_rules! scope_exit {
    ([$($name:ident $(= $value:expr)?),* $(,)?] => $body:block) => {
        let _scope_exit_guard = $crate::guard(
            ($($crate::__capture_value!($name $(= $value)?),)*),
            |($($name,)*)| $body,
        );
    };
    ($body:block) => {
        let _scope_exit_guard = $crate::on_exit(|| $body);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __capture_value {
    ($name:ident) => {
        $name
    };
    ($name:ident = $value:expr) => {
        $value
    };
}
