//! Naming for scopes in diagnostics.

use std::fmt;
use std::panic::Location;

/// Identifies a scope in log events and exhaustion diagnostics.
///
/// Combines an optional caller-chosen label with the source location
/// where the scope or guard was created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeSite {
    label: Option<String>,
    location: &'static Location<'static>,
}

impl ScopeSite {
    /// Build a site from an explicit label and location.
    pub fn new(label: Option<String>, location: &'static Location<'static>) -> Self {
        Self { label, location }
    }

    /// Capture the caller's location, with an optional label.
    #[track_caller]
    pub fn here(label: Option<String>) -> Self {
        Self::new(label, Location::caller())
    }

    /// The caller-chosen label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Source location of the scope's creation.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for ScopeSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label} ({})", self.location),
            None => write!(f, "{}", self.location),
        }
    }
}
