//! Scope configuration parameters.

use crate::error::DeferError;
use crate::record::RECORD_ALIGN;

/// What a scope does when a record cannot be placed anywhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Emit a diagnostic naming the scope and its byte counts, then panic.
    ///
    /// This treats an undersized scope as a setup bug. The panic unwinds
    /// only the current thread: a caller's `catch_unwind`, or a spawned
    /// thread's join handle, absorbs it and the process keeps running.
    /// The process terminates only when built with `panic = "abort"`.
    #[default]
    Fatal,
    /// Return the failure from the registration call. The action is
    /// dropped without running.
    Recoverable,
}

/// Configuration for a defer scope's arena (`lastcall_arena::ScopeArena`).
///
/// Validated when the arena is created; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeConfig {
    /// Size of the bump arena in bytes, reserved when the arena is created.
    ///
    /// Default: 256. Must be a multiple of [`RECORD_ALIGN`] and no larger
    /// than [`ScopeConfig::MAX_CAPACITY`]. Zero is allowed and sends every
    /// record to the fallback allocator.
    pub capacity: usize,

    /// Behaviour when both the bump region and the fallback are exhausted.
    pub failure_mode: FailureMode,

    /// Optional name used in diagnostics alongside the creation site.
    pub label: Option<String>,
}

impl ScopeConfig {
    /// Default bump region size in bytes.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Largest accepted bump region (1 MiB).
    pub const MAX_CAPACITY: usize = 1 << 20;

    /// Create a config with the given capacity and default settings.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            failure_mode: FailureMode::default(),
            label: None,
        }
    }

    /// Set the failure mode.
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    /// Shorthand for [`FailureMode::Recoverable`].
    pub fn recoverable(self) -> Self {
        self.with_failure_mode(FailureMode::Recoverable)
    }

    /// Attach a diagnostic label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<(), DeferError> {
        if self.capacity > Self::MAX_CAPACITY {
            return Err(DeferError::InvalidConfig {
                reason: format!(
                    "capacity {} exceeds maximum {}",
                    self.capacity,
                    Self::MAX_CAPACITY
                ),
            });
        }
        if self.capacity % RECORD_ALIGN != 0 {
            return Err(DeferError::InvalidConfig {
                reason: format!(
                    "capacity {} is not a multiple of the record alignment {RECORD_ALIGN}",
                    self.capacity
                ),
            });
        }
        if matches!(&self.label, Some(label) if label.trim().is_empty()) {
            return Err(DeferError::InvalidConfig {
                reason: "label must not be blank".into(),
            });
        }
        Ok(())
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
