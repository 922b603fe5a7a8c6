//! Diagnostic codes with category prefixes for structured identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The engine component that produced a diagnostic, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Signature store persistence, prefixed with `C`.
    Cache,
    /// Signature computation, prefixed with `S`.
    Signature,
    /// Artifact routing and distribution, prefixed with `R`.
    Routing,
    /// Stale artifact reclamation, prefixed with `G`.
    Reaper,
    /// Build hierarchy resolution, prefixed with `H`.
    Hierarchy,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Cache => 'C',
            Category::Signature => 'S',
            Category::Routing => 'R',
            Category::Reaper => 'G',
            Category::Hierarchy => 'H',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g. `C101`, `R301`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }

    /// The signature store could not be read; every contract regenerates.
    pub const CACHE_UNREADABLE: Self = Self::new(Category::Cache, 101);
    /// A signature record could not be appended to durable storage.
    pub const CACHE_WRITE_FAILED: Self = Self::new(Category::Cache, 102);
    /// Malformed or incompatible signature records were discarded.
    pub const CACHE_RECORDS_DISCARDED: Self = Self::new(Category::Cache, 103);
    /// A contract's source was unavailable and the structural signature was used.
    pub const STRUCTURAL_FALLBACK: Self = Self::new(Category::Signature, 201);
    /// No destination matched an artifact's namespace; the default was used.
    pub const ROUTE_DEFAULTED: Self = Self::new(Category::Routing, 301);
    /// A generated artifact could not be read and was skipped.
    pub const ARTIFACT_UNREADABLE: Self = Self::new(Category::Routing, 302);
    /// The producer directory to distribute from does not exist.
    pub const PRODUCER_MISSING: Self = Self::new(Category::Routing, 303);
    /// An artifact could not be copied to its destination.
    pub const COPY_FAILED: Self = Self::new(Category::Routing, 304);
    /// A stale artifact could not be deleted.
    pub const STALE_DELETE_FAILED: Self = Self::new(Category::Reaper, 401);
    /// The signature store could not be compacted.
    pub const COMPACTION_FAILED: Self = Self::new(Category::Reaper, 402);
    /// The hierarchy has several parentless ancestors and none is designated.
    pub const AMBIGUOUS_SHARED_ROOT: Self = Self::new(Category::Hierarchy, 501);
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}
