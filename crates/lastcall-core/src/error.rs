//! Error types for the lastcall runtime.
//!
//! Registration failures are local to the registration call and returned
//! synchronously. Failures inside a deferred action are never surfaced
//! through these types; see [`crate::action`].

use std::error::Error;
use std::fmt;

/// Errors from creating a defer scope or registering a record against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeferError {
    /// The bump region is full and no fallback allocator is configured.
    ArenaExhausted {
        /// Name of the exhausted scope (label and creation site).
        scope: String,
        /// Bytes already bump-allocated.
        used: usize,
        /// Bytes left in the bump region.
        remaining: usize,
        /// Footprint of the record that did not fit.
        needed: usize,
    },
    /// The bump region is full and the fallback allocator refused the request.
    FallbackFailed {
        /// Name of the scope that overflowed.
        scope: String,
        /// Footprint of the record that could not be placed.
        needed: usize,
        /// Why the fallback refused.
        reason: FallbackError,
    },
    /// The scope configuration was rejected at creation time.
    InvalidConfig {
        /// Description of the violated constraint.
        reason: String,
    },
}

impl fmt::Display for DeferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArenaExhausted {
                scope,
                used,
                remaining,
                needed,
            } => {
                write!(
                    f,
                    "no room for deferred closure in scope {scope}: used {used} bytes, \
                     remaining {remaining} bytes, needed {needed} bytes; increase the scope capacity"
                )
            }
            Self::FallbackFailed {
                scope,
                needed,
                reason,
            } => {
                write!(
                    f,
                    "fallback allocator refused {needed} bytes for scope {scope}: {reason}"
                )
            }
            Self::InvalidConfig { reason } => write!(f, "invalid scope config: {reason}"),
        }
    }
}

impl Error for DeferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::FallbackFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Errors reported by a [`FallbackAllocator`](crate::FallbackAllocator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackError {
    /// The allocator's byte budget cannot cover the request.
    OutOfMemory {
        /// Bytes requested.
        requested: usize,
        /// Bytes still available in the allocator.
        available: usize,
    },
    /// The allocator declined for an implementation-specific reason.
    Refused {
        /// Human-readable description.
        reason: String,
    },
}

impl fmt::Display for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                available,
            } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes, available {available} bytes"
                )
            }
            Self::Refused { reason } => write!(f, "refused: {reason}"),
        }
    }
}

impl Error for FallbackError {}
