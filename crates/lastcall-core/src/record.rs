//! Record sizing and registration handles.
//!
//! Every registration is charged a footprint: a fixed header plus the
//! captured payload and action state, rounded up to [`RECORD_ALIGN`].
//! The same footprint is what a record occupies in its scope's arena or
//! requests from the fallback allocator, so byte accounting and real
//! storage never disagree.

use std::alloc::Layout;
use std::fmt;

/// Bytes charged per record for its chain entry, on top of the payload.
pub const RECORD_HEADER_BYTES: usize = 8;

/// Alignment every record footprint is rounded up to.
pub const RECORD_ALIGN: usize = 8;

/// Size accounting and storage layout for one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    payload: Layout,
}

impl RecordLayout {
    /// Layout for a record whose payload has the given layout.
    pub fn new(payload: Layout) -> Self {
        Self { payload }
    }

    /// Layout for a record whose payload is a `T`.
    pub fn of<T>() -> Self {
        Self::new(Layout::new::<T>())
    }

    /// Layout for a record holding `value`.
    pub fn of_val<T>(value: &T) -> Self {
        Self::new(Layout::for_value(value))
    }

    /// Size of the captured payload and action state.
    pub fn payload_bytes(&self) -> usize {
        self.payload.size()
    }

    /// Alignment of the record's storage: the payload's, at least [`RECORD_ALIGN`].
    pub fn align(&self) -> usize {
        self.payload.align().max(RECORD_ALIGN)
    }

    /// Total bytes charged: header plus payload, rounded up to [`RECORD_ALIGN`].
    pub fn footprint(&self) -> usize {
        let raw = RECORD_HEADER_BYTES + self.payload.size();
        raw.div_ceil(RECORD_ALIGN) * RECORD_ALIGN
    }

    /// Layout of the storage requested for the record.
    ///
    /// Covers the full footprint, so it always fits the payload.
    pub fn storage(&self) -> Layout {
        // Only fails for payloads within a header of isize::MAX.
        Layout::from_size_align(self.footprint(), self.align()).unwrap_or(self.payload)
    }
}

/// Which allocator satisfied a registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordSource {
    /// The scope's bump arena.
    Arena,
    /// The fallback allocator.
    Fallback,
    /// Stored inline in a standalone guard; no allocator involved.
    Inline,
}

/// Receipt for a successful registration.
///
/// Handles are informational: a record cannot be cancelled or invoked
/// through its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHandle {
    position: usize,
    footprint: usize,
    source: RecordSource,
}

impl RecordHandle {
    /// Create a handle.
    pub fn new(position: usize, footprint: usize, source: RecordSource) -> Self {
        Self {
            position,
            footprint,
            source,
        }
    }

    /// Registration order within the scope, starting at 0.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes charged for the record.
    pub fn footprint(&self) -> usize {
        self.footprint
    }

    /// Which allocator holds the record.
    pub fn source(&self) -> RecordSource {
        self.source
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecordHandle(pos={}, bytes={}, {:?})",
            self.position, self.footprint, self.source
        )
    }
}
