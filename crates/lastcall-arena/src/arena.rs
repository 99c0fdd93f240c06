//! Fixed-size record storage for defer scopes.
//!
//! A [`ScopeArena`] reserves its configured capacity once, up front, and
//! never grows: a record that does not fit goes to the scope's fallback
//! allocator instead. The arena is declared next to the
//! [`DeferScope`](crate::DeferScope) that borrows it and may be reused by
//! later scopes; each new scope starts from an empty arena.

use bumpalo::Bump;
use lastcall_core::{DeferError, ScopeConfig};

/// Bump-allocated storage backing one defer scope at a time.
#[derive(Debug)]
pub struct ScopeArena {
    config: ScopeConfig,
    storage: Bump,
}

impl ScopeArena {
    /// Validate `config` and reserve its capacity.
    pub fn new(config: ScopeConfig) -> Result<Self, DeferError> {
        config.validate()?;
        let storage = Bump::with_capacity(config.capacity);
        storage.set_allocation_limit(Some(storage.allocated_bytes()));
        Ok(Self { config, storage })
    }

    /// Arena of `capacity` bytes with default settings (fatal on exhaustion).
    pub fn with_capacity(capacity: usize) -> Result<Self, DeferError> {
        Self::new(ScopeConfig::new(capacity))
    }

    /// Configuration the arena was created with.
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Bytes actually reserved, at least the configured capacity.
    pub fn reserved_bytes(&self) -> usize {
        self.storage.allocated_bytes()
    }

    /// Empty the arena for a new scope and lend out its storage.
    pub(crate) fn begin(&mut self) -> (&ScopeConfig, &Bump) {
        self.storage.reset();
        (&self.config, &self.storage)
    }
}
