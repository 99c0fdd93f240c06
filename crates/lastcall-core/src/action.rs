//! Deferred actions and their isolated invocation.
//!
//! A deferred action is a payload snapshot plus a callable that consumes
//! it. [`Capture`] pairs the two; [`Deferred`] is the contract a scope's
//! record storage and a standalone guard both invoke through. Actions may
//! return `()` or a `Result<(), E>`; see [`ActionResult`].
//!
//! [`invoke_isolated`] is the only way the runtime calls an action. It
//! contains panics so one failing action never prevents the rest of a
//! chain from running.

use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};

use crate::site::ScopeSite;

/// Error type carried out of a fallible deferred action.
pub type ActionError = Box<dyn Error + 'static>;

/// Return types a deferred action may produce.
pub trait ActionResult {
    /// Normalise into the runtime's result type.
    fn into_action_result(self) -> Result<(), ActionError>;
}

impl ActionResult for () {
    fn into_action_result(self) -> Result<(), ActionError> {
        Ok(())
    }
}

impl<E> ActionResult for Result<(), E>
where
    E: Into<ActionError>,
{
    fn into_action_result(self) -> Result<(), ActionError> {
        self.map_err(Into::into)
    }
}

/// A deferred action, run exactly once.
pub trait Deferred {
    /// Run the action, consuming it.
    fn run(self) -> Result<(), ActionError>;
}

/// Captured payload plus the action that consumes it.
///
/// The payload is moved in at registration and handed to the action
/// unchanged at invocation, so later changes to the source variables are
/// never observed.
pub struct Capture<T, F> {
    payload: T,
    action: F,
}

impl<T, F> Capture<T, F> {
    /// Pair a payload snapshot with its action.
    pub fn new(payload: T, action: F) -> Self {
        Self { payload, action }
    }

    /// Read-only view of the captured payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }
}

impl<T, F, R> Deferred for Capture<T, F>
where
    F: FnOnce(T) -> R,
    R: ActionResult,
{
    fn run(self) -> Result<(), ActionError> {
        (self.action)(self.payload).into_action_result()
    }
}

/// How a single invocation ended.
pub enum ActionOutcome {
    /// The action returned normally.
    Completed,
    /// The action returned an error.
    Failed(ActionError),
    /// The action panicked; the payload is kept for resumption.
    Panicked(Box<dyn Any + Send + 'static>),
}

impl std::fmt::Debug for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::Failed(err) => write!(f, "Failed({err})"),
            Self::Panicked(payload) => write!(f, "Panicked({})", panic_message(payload.as_ref())),
        }
    }
}

/// Invoke an action so that neither its error nor its panic escapes.
pub fn invoke_isolated<F>(run: F) -> ActionOutcome
where
    F: FnOnce() -> Result<(), ActionError>,
{
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => ActionOutcome::Completed,
        Ok(Err(err)) => ActionOutcome::Failed(err),
        Err(payload) => ActionOutcome::Panicked(payload),
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Re-raise a contained panic once a release has finished.
///
/// If the thread is already unwinding, raising again would abort the
/// process, so the panic is logged and dropped instead.
pub fn resume_contained_panic(payload: Box<dyn Any + Send + 'static>, site: &ScopeSite) {
    if std::thread::panicking() {
        tracing::warn!(
            scope = %site,
            panic = panic_message(payload.as_ref()),
            "deferred action panicked during unwinding; panic dropped"
        );
        return;
    }
    panic::resume_unwind(payload);
}
