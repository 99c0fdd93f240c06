//! Core types and traits for the lastcall defer runtime.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! pieces shared by every scope-exit mechanism in the workspace: the
//! closure record format, the fallback allocator interface, scope
//! configuration, error types, and the isolated invocation path that
//! runs a deferred action exactly once.
//!
//! `unsafe` is confined to [`fallback`], where allocators hand out raw
//! memory for records that overflow their scope's arena.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod action;
pub mod config;
pub mod error;
pub mod fallback;
pub mod record;
pub mod site;

pub use action::{invoke_isolated, ActionError, ActionOutcome, ActionResult, Capture, Deferred};
pub use config::{FailureMode, ScopeConfig};
pub use error::{DeferError, FallbackError};
pub use fallback::{BoundedFallback, FallbackAllocator, FallbackBlock, HeapFallback};
pub use record::{RecordHandle, RecordLayout, RecordSource, RECORD_ALIGN, RECORD_HEADER_BYTES};
pub use site::ScopeSite;
