//! Contract fingerprinting and change detection.
//!
//! Computes a [`Signature`] for every contract of a pass and compares the
//! result against the [`SignatureStore`] to identify which contracts are new,
//! modified, removed, or unchanged since the last successful generation.

use std::collections::{BTreeMap, BTreeSet};

use fakt_common::{Contract, Signature};
use rayon::prelude::*;

use crate::store::SignatureStore;

/// Result of comparing current contract signatures against the signature store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Contracts with no recorded signature.
    pub new: Vec<String>,

    /// Contracts whose recorded signature differs from the current one.
    pub modified: Vec<String>,

    /// Contracts recorded in the store but absent from the current pass.
    pub removed: Vec<String>,

    /// Contracts whose recorded signature matches.
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    /// Returns `true` if there are no new, modified, or removed contracts.
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Returns the number of contracts whose own signature requires regeneration.
    pub fn dirty_count(&self) -> usize {
        self.new.len() + self.modified.len()
    }

    /// Returns every name that counts as changed for dependency invalidation.
    pub fn changed_names(&self) -> BTreeSet<String> {
        self.new
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .cloned()
            .collect()
    }
}

/// Signatures computed for one pass.
#[derive(Debug, Clone, Default)]
pub struct ComputedSignatures {
    /// Signature per contract name.
    pub signatures: BTreeMap<String, Signature>,

    /// Contracts whose source was unavailable and got a structural signature.
    pub fallbacks: BTreeSet<String>,
}

/// Utility for fingerprinting contracts and detecting changes.
pub struct SignatureComputer;

impl SignatureComputer {
    /// Computes the signature of a contract.
    ///
    /// With raw source bytes this is a content hash that changes on any edit,
    /// comments and whitespace included. Without them it degrades to a
    /// structural hash of kind, name, and member counts.
    pub fn compute(contract: &Contract, raw_content: Option<&[u8]>) -> Signature {
        match raw_content {
            Some(bytes) => Signature::from_content(bytes),
            None => Signature::structural(
                contract.kind,
                &contract.name,
                contract.properties.len(),
                contract.methods.len(),
            ),
        }
    }

    /// Computes the signature of a contract from its backing source file.
    ///
    /// Falls back to the structural signature if the contract has no source
    /// path or the file cannot be read.
    pub fn compute_from_source(contract: &Contract) -> Signature {
        let raw = contract.source.as_ref().and_then(|path| match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(
                    contract = %contract.name,
                    path = %path.display(),
                    error = %e,
                    "source unreadable, using structural signature"
                );
                None
            }
        });
        Self::compute(contract, raw.as_deref())
    }

    /// Computes signatures for all contracts in parallel.
    pub fn compute_all(contracts: &[Contract]) -> ComputedSignatures {
        let computed: Vec<(String, Signature)> = contracts
            .par_iter()
            .map(|c| (c.name.clone(), Self::compute_from_source(c)))
            .collect();

        let mut out = ComputedSignatures::default();
        for (name, signature) in computed {
            if signature.is_structural() {
                out.fallbacks.insert(name.clone());
            } else {
                out.fallbacks.remove(&name);
            }
            out.signatures.insert(name, signature);
        }
        out
    }

    /// Compares current signatures against the store to detect changes.
    pub fn detect_changes(
        current: &BTreeMap<String, Signature>,
        store: &SignatureStore,
    ) -> ChangeSet {
        let mut changes = ChangeSet::default();

        // BTreeMap iteration keeps every list sorted
        for (name, signature) in current {
            match store.get(name) {
                Some(entry) if entry.signature == *signature => {
                    changes.unchanged.push(name.clone());
                }
                Some(_) => changes.modified.push(name.clone()),
                None => changes.new.push(name.clone()),
            }
        }

        changes.removed = store
            .names()
            .into_iter()
            .filter(|n| !current.contains_key(n))
            .collect();

        changes
    }
}
