//! Byte accounting for a scope's arena.
//!
//! A [`BumpRegion`] charges record footprints sequentially against the
//! capacity of the arena it mirrors. Ranges are never freed individually;
//! the whole region is reclaimed when its scope ends.

/// Bump cursor over a fixed byte budget.
#[derive(Debug)]
pub struct BumpRegion {
    capacity: usize,
    /// Bump pointer: next free byte offset.
    cursor: usize,
}

impl BumpRegion {
    /// Create a region of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cursor: 0,
        }
    }

    /// Bump-allocate `len` bytes.
    ///
    /// Returns the starting offset, or `None` if the remaining capacity
    /// cannot hold `len` bytes. A request that exactly fills the region
    /// succeeds.
    pub fn alloc(&mut self, len: usize) -> Option<usize> {
        let new_cursor = self.cursor.checked_add(len)?;
        if new_cursor > self.capacity {
            return None;
        }
        let offset = self.cursor;
        self.cursor = new_cursor;
        Some(offset)
    }

    /// Undo the most recent allocation, which started at `offset`.
    pub fn rewind(&mut self, offset: usize) {
        debug_assert!(offset <= self.cursor);
        self.cursor = offset.min(self.cursor);
    }

    /// Bytes allocated so far.
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remaining free bytes.
    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }
}
