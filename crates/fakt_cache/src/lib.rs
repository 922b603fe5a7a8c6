//! Incremental generation cache for the Fakt code generator.
//!
//! This crate decides, per declared contract, whether regeneration can be
//! skipped. It fingerprints contracts ([`SignatureComputer`]), persists the
//! fingerprints in an append-only shared log ([`SignatureStore`]), tracks which
//! contracts depend on which ([`DependencyGraph`]) so that a change forces its
//! dependents to regenerate, and reclaims artifacts of contracts that no longer
//! exist ([`reap`]). [`GenerationCache`] ties these together for one pass.

#![warn(missing_docs)]

pub mod cache;
pub mod deps;
pub mod error;
pub mod hasher;
pub mod lock;
pub mod reaper;
pub mod store;

pub use cache::{Decision, GenerationCache, PassPlan, Reason};
pub use deps::DependencyGraph;
pub use error::CacheError;
pub use hasher::{ChangeSet, ComputedSignatures, SignatureComputer};
pub use reaper::{reap, ReapReport};
pub use store::{
    FileBackend, MemoryBackend, RecordOutcome, SignatureStore, StoreBackend, StoreEntry,
    STORE_FORMAT_VERSION,
};

/// Default file name of the signature store inside a cache directory.
pub const DEFAULT_STORE_FILE: &str = "signatures.jsonl";
