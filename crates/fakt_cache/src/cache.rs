//! High-level generation cache for one compilation pass.
//!
//! `GenerationCache` ties together the signature computer, the signature
//! store, the dependency graph, and the reaper. A pass calls [`plan`] to learn
//! which contracts need regeneration and why, runs the generator for those,
//! then calls [`record_generation`] for each success and finally [`reap`].
//!
//! [`plan`]: GenerationCache::plan
//! [`record_generation`]: GenerationCache::record_generation
//! [`reap`]: GenerationCache::reap

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fakt_common::{Contract, Signature};
use fakt_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::deps::DependencyGraph;
use crate::error::CacheError;
use crate::hasher::{ChangeSet, SignatureComputer};
use crate::reaper::{self, ReapReport};
use crate::store::{RecordOutcome, SignatureStore, StoreEntry};

/// Why a contract does or does not need regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Reason {
    /// No signature was recorded for the contract.
    New,
    /// The recorded signature differs from the current one.
    Modified,
    /// The contract's own signature matches, but something it depends on changed.
    DependencyChanged {
        /// The changed contract that triggered invalidation.
        cause: String,
    },
    /// Nothing relevant changed; generation can be skipped.
    Unchanged,
    /// Caching is turned off; every contract regenerates.
    CacheDisabled,
}

impl Reason {
    /// Returns `true` if the contract must be regenerated.
    pub fn needs_regeneration(&self) -> bool {
        !matches!(self, Reason::Unchanged)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::New => f.write_str("new"),
            Reason::Modified => f.write_str("modified"),
            Reason::DependencyChanged { cause } => write!(f, "dependency changed ({cause})"),
            Reason::Unchanged => f.write_str("unchanged"),
            Reason::CacheDisabled => f.write_str("cache disabled"),
        }
    }
}

/// The planner's verdict for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// The contract's signature for this pass.
    pub signature: Signature,
    /// Why the contract does or does not need regeneration.
    #[serde(flatten)]
    pub reason: Reason,
}

/// The result of planning a pass.
#[derive(Debug, Clone, Default)]
pub struct PassPlan {
    /// Verdict per contract name, sorted by name.
    pub decisions: BTreeMap<String, Decision>,
    /// Raw signature comparison against the store.
    pub changes: ChangeSet,
    /// Contracts whose signature used the structural fallback.
    pub fallbacks: BTreeSet<String>,
}

impl PassPlan {
    /// Returns the names of contracts that must be regenerated, sorted.
    pub fn to_regenerate(&self) -> Vec<&str> {
        self.decisions
            .iter()
            .filter(|(_, d)| d.reason.needs_regeneration())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Returns `true` if the named contract must be regenerated.
    ///
    /// Contracts unknown to this plan always need regeneration.
    pub fn needs_regeneration(&self, name: &str) -> bool {
        self.decisions
            .get(name)
            .map_or(true, |d| d.reason.needs_regeneration())
    }

    /// Returns the signature computed for the named contract.
    pub fn signature(&self, name: &str) -> Option<Signature> {
        self.decisions.get(name).map(|d| d.signature)
    }

    /// Returns `true` if no contract needs regeneration.
    pub fn is_up_to_date(&self) -> bool {
        self.decisions
            .values()
            .all(|d| !d.reason.needs_regeneration())
    }
}

/// Incremental generation cache bound to one signature store.
///
/// Safe to share across generation units: planning only reads, and every
/// mutation goes through the store's serialized write path.
pub struct GenerationCache {
    store: SignatureStore,
    graph: OnceCell<RwLock<DependencyGraph>>,
    sink: Arc<DiagnosticSink>,
    artifact_root: PathBuf,
    enabled: bool,
    // Names regenerated through this instance; reaping does not invalidate them
    recorded: Mutex<BTreeSet<String>>,
}

impl GenerationCache {
    /// Opens a cache backed by the store file at `store_path`.
    ///
    /// Relative artifact paths are resolved against `artifact_root`.
    pub fn open(
        store_path: impl Into<PathBuf>,
        artifact_root: impl Into<PathBuf>,
        sink: Arc<DiagnosticSink>,
    ) -> Self {
        let store = SignatureStore::open(store_path, Arc::clone(&sink));
        Self::with_store(store, artifact_root, sink)
    }

    /// Creates a cache over an existing store.
    pub fn with_store(
        store: SignatureStore,
        artifact_root: impl Into<PathBuf>,
        sink: Arc<DiagnosticSink>,
    ) -> Self {
        Self {
            store,
            graph: OnceCell::new(),
            sink,
            artifact_root: artifact_root.into(),
            enabled: true,
            recorded: Mutex::new(BTreeSet::new()),
        }
    }

    /// Turns caching on or off. A disabled cache never reads or writes the store.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns `true` if caching is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the underlying signature store.
    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    /// Returns the diagnostic sink.
    pub fn sink(&self) -> &Arc<DiagnosticSink> {
        &self.sink
    }

    /// Returns the directory relative artifact paths are resolved against.
    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    /// Returns a copy of the persistent dependency graph.
    pub fn dependency_graph(&self) -> DependencyGraph {
        self.graph().read().clone()
    }

    fn graph(&self) -> &RwLock<DependencyGraph> {
        self.graph
            .get_or_init(|| RwLock::new(DependencyGraph::from_entries(&self.store.snapshot())))
    }

    /// Returns `true` if `name` has no recorded signature, a different one,
    /// or was invalidated by reaping one of its dependencies.
    pub fn needs_regeneration(&self, name: &str, signature: &Signature) -> bool {
        !self.enabled || self.store.needs_regeneration(name, signature)
    }

    /// Decides, for every contract of this pass, whether it must be regenerated.
    ///
    /// Contracts that are new or modified regenerate on their own account.
    /// Contracts with an unchanged signature still regenerate if they
    /// transitively depend on a new, modified, or removed contract, or if an
    /// earlier reap purged one of their dependencies. The result does not
    /// depend on the order of `contracts`.
    pub fn plan(&self, contracts: &[Contract]) -> PassPlan {
        let computed = SignatureComputer::compute_all(contracts);
        self.report_fallbacks(contracts, &computed.fallbacks);

        if !self.enabled {
            let decisions = computed
                .signatures
                .iter()
                .map(|(name, sig)| {
                    let decision = Decision {
                        signature: *sig,
                        reason: Reason::CacheDisabled,
                    };
                    (name.clone(), decision)
                })
                .collect();
            return PassPlan {
                decisions,
                changes: ChangeSet::default(),
                fallbacks: computed.fallbacks,
            };
        }

        let changes = SignatureComputer::detect_changes(&computed.signatures, &self.store);

        let mut pass_graph = self.dependency_graph();
        for contract in contracts {
            pass_graph.record_dependencies(&contract.name, contract.depends_on.iter().cloned());
        }

        // Roots are visited in sorted order, so the first cause recorded is stable
        let mut causes: BTreeMap<String, String> = BTreeMap::new();
        for root in changes.changed_names() {
            for dependent in pass_graph.find_transitive_dependents(&root) {
                causes.entry(dependent).or_insert_with(|| root.clone());
            }
        }

        let new: BTreeSet<&String> = changes.new.iter().collect();
        let modified: BTreeSet<&String> = changes.modified.iter().collect();

        let mut decisions = BTreeMap::new();
        for (name, signature) in &computed.signatures {
            let reason = if new.contains(name) {
                Reason::New
            } else if modified.contains(name) {
                Reason::Modified
            } else if let Some(cause) = causes.get(name) {
                Reason::DependencyChanged {
                    cause: cause.clone(),
                }
            } else if let Some(cause) = self.store.get(name).and_then(|e| e.invalidated_by) {
                Reason::DependencyChanged { cause }
            } else {
                Reason::Unchanged
            };
            tracing::trace!(contract = %name, %reason, "planned");
            decisions.insert(
                name.clone(),
                Decision {
                    signature: *signature,
                    reason,
                },
            );
        }

        let plan = PassPlan {
            decisions,
            changes,
            fallbacks: computed.fallbacks,
        };
        tracing::debug!(
            contracts = plan.decisions.len(),
            regenerate = plan.to_regenerate().len(),
            removed = plan.changes.removed.len(),
            "planned generation pass"
        );
        plan
    }

    fn report_fallbacks(&self, contracts: &[Contract], fallbacks: &BTreeSet<String>) {
        for contract in contracts.iter().filter(|c| fallbacks.contains(&c.name)) {
            let mut diag = Diagnostic::note(
                DiagnosticCode::STRUCTURAL_FALLBACK,
                format!(
                    "source of '{}' is unavailable; using a structural signature",
                    contract.name
                ),
            )
            .with_note("edits that keep member counts unchanged will not be detected");
            if let Some(source) = &contract.source {
                diag = diag.with_path(source);
            }
            self.sink.emit(diag);
        }
    }

    /// Records a successful generation of `contract`.
    ///
    /// Stores the signature together with the generated artifact paths and
    /// the contract's dependency set, clearing any invalidation mark. Returns
    /// `None` if caching is off.
    pub fn record_generation(
        &self,
        contract: &Contract,
        signature: &Signature,
        artifacts: Vec<PathBuf>,
    ) -> Option<RecordOutcome> {
        if !self.enabled {
            return None;
        }
        let entry = StoreEntry::new(*signature)
            .with_artifacts(artifacts)
            .with_dependencies(contract.depends_on.clone());
        let outcome = self.store.record(&contract.name, entry);
        self.recorded.lock().insert(contract.name.clone());
        self.graph()
            .write()
            .record_dependencies(&contract.name, contract.depends_on.iter().cloned());
        Some(outcome)
    }

    /// Reaps contracts absent from `current`, then compacts the store if anything was purged.
    ///
    /// Surviving dependents of purged contracts are marked for regeneration
    /// unless they were already recorded through this cache.
    pub fn reap(&self, current: &BTreeSet<String>) -> ReapReport {
        if !self.enabled {
            return ReapReport::default();
        }
        let fresh = self.recorded.lock().clone();
        let report = {
            let mut graph = self.graph().write();
            reaper::reap(
                &self.store,
                &mut graph,
                current,
                &fresh,
                &self.artifact_root,
                &self.sink,
            )
        };

        if report.purged_count() > 0 {
            if let Err(e) = self.store.compact() {
                let mut diag = Diagnostic::warning(
                    DiagnosticCode::COMPACTION_FAILED,
                    "signature store could not be compacted after reaping",
                )
                .with_note(e.to_string());
                if let Some(path) = self.store.location() {
                    diag = diag.with_path(path);
                }
                self.sink.emit(diag);
            }
        }
        report
    }

    /// Compacts the signature store.
    pub fn compact(&self) -> Result<(), CacheError> {
        self.store.compact()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    struct Project {
        dir: tempfile::TempDir,
    }

    impl Project {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn contract(&self, name: &str, body: &str, deps: &[&str]) -> Contract {
            let path = self.dir.path().join(format!("{name}.kt"));
            std::fs::write(&path, body).unwrap();
            let mut c = Contract::new(format!("com.x.{name}")).with_source(path);
            for dep in deps {
                c = c.depending_on(format!("com.x.{dep}"));
            }
            c
        }

        fn cache(&self, backend: &MemoryBackend) -> GenerationCache {
            let sink = Arc::new(DiagnosticSink::new());
            let store = SignatureStore::new(Box::new(backend.clone()), Arc::clone(&sink));
            GenerationCache::with_store(store, self.dir.path(), sink)
        }
    }

    fn commit(cache: &GenerationCache, plan: &PassPlan, contracts: &[Contract]) {
        for c in contracts {
            if plan.needs_regeneration(&c.name) {
                let sig = plan.signature(&c.name).unwrap();
                cache.record_generation(c, &sig, Vec::new());
            }
        }
    }

    fn reason(plan: &PassPlan, name: &str) -> Reason {
        plan.decisions[&format!("com.x.{name}")].reason.clone()
    }

    #[test]
    fn first_pass_everything_new() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![
            p.contract("A", "interface A", &[]),
            p.contract("B", "interface B", &[]),
        ];
        let plan = p.cache(&backend).plan(&contracts);
        assert_eq!(plan.to_regenerate().len(), 2);
        assert_eq!(reason(&plan, "A"), Reason::New);
    }

    #[test]
    fn second_pass_unchanged_is_skipped() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![p.contract("A", "interface A", &[])];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&contracts);
            commit(&cache, &plan, &contracts);
        }
        let plan = p.cache(&backend).plan(&contracts);
        assert!(plan.is_up_to_date());
        assert_eq!(reason(&plan, "A"), Reason::Unchanged);
    }

    #[test]
    fn comment_edit_is_modified() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![p.contract("A", "interface A", &[])];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&contracts);
            commit(&cache, &plan, &contracts);
        }
        let contracts = vec![p.contract("A", "// doc\ninterface A", &[])];
        let plan = p.cache(&backend).plan(&contracts);
        assert_eq!(reason(&plan, "A"), Reason::Modified);
    }

    #[test]
    fn change_propagates_to_transitive_dependents() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let pass1 = vec![
            p.contract("C", "interface C", &[]),
            p.contract("B", "interface B", &["C"]),
            p.contract("A", "interface A", &["B"]),
            p.contract("Z", "interface Z", &[]),
        ];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&pass1);
            commit(&cache, &plan, &pass1);
        }

        let mut pass2 = pass1.clone();
        pass2[0] = p.contract("C", "interface C { fun c() }", &[]);
        let plan = p.cache(&backend).plan(&pass2);
        assert_eq!(reason(&plan, "C"), Reason::Modified);
        assert_eq!(
            reason(&plan, "B"),
            Reason::DependencyChanged {
                cause: "com.x.C".into()
            }
        );
        assert_eq!(
            reason(&plan, "A"),
            Reason::DependencyChanged {
                cause: "com.x.C".into()
            }
        );
        assert_eq!(reason(&plan, "Z"), Reason::Unchanged);
    }

    #[test]
    fn removed_dependency_invalidates_dependents() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let pass1 = vec![
            p.contract("A", "interface A", &["B"]),
            p.contract("B", "interface B", &[]),
        ];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&pass1);
            commit(&cache, &plan, &pass1);
        }
        let pass2 = vec![pass1[0].clone()];
        let plan = p.cache(&backend).plan(&pass2);
        assert_eq!(plan.changes.removed, vec!["com.x.B"]);
        assert_eq!(
            reason(&plan, "A"),
            Reason::DependencyChanged {
                cause: "com.x.B".into()
            }
        );
    }

    #[test]
    fn new_dependency_edge_in_this_pass_is_honored() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let pass1 = vec![p.contract("A", "interface A", &[])];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&pass1);
            commit(&cache, &plan, &pass1);
        }
        // A's edge to the new contract N comes from the analyzer, not the store
        let mut a = pass1[0].clone();
        a.depends_on.insert("com.x.N".into());
        let pass2 = vec![a, p.contract("N", "interface N", &[])];
        let plan = p.cache(&backend).plan(&pass2);
        assert_eq!(reason(&plan, "N"), Reason::New);
        assert_eq!(
            reason(&plan, "A"),
            Reason::DependencyChanged {
                cause: "com.x.N".into()
            }
        );
    }

    #[test]
    fn plan_is_order_independent() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![
            p.contract("A", "interface A", &["B"]),
            p.contract("B", "interface B", &["C"]),
            p.contract("C", "interface C", &[]),
        ];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&contracts);
            commit(&cache, &plan, &contracts);
        }
        let mut edited = contracts.clone();
        edited[2] = p.contract("C", "interface C2", &[]);
        let mut reversed = edited.clone();
        reversed.reverse();

        let cache = p.cache(&backend);
        assert_eq!(cache.plan(&edited).decisions, cache.plan(&reversed).decisions);
    }

    #[test]
    fn disabled_cache_regenerates_everything() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![p.contract("A", "interface A", &[])];
        let cache = p.cache(&backend).with_enabled(false);
        let plan = cache.plan(&contracts);
        assert_eq!(reason(&plan, "A"), Reason::CacheDisabled);

        let sig = plan.signature("com.x.A").unwrap();
        assert!(cache.record_generation(&contracts[0], &sig, Vec::new()).is_none());
        assert!(cache.needs_regeneration("com.x.A", &sig));
        assert!(backend.contents().is_none());
    }

    #[test]
    fn corrupt_store_regenerates_everything_without_failing() {
        let p = Project::new();
        let backend = MemoryBackend::with_contents(vec![0u8, 159, 146, 150]);
        let contracts = vec![p.contract("A", "interface A", &[])];
        let cache = p.cache(&backend);
        let plan = cache.plan(&contracts);
        assert_eq!(reason(&plan, "A"), Reason::New);
        assert!(cache.sink().warning_count() > 0);
    }

    #[test]
    fn structural_fallback_emits_note() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![Contract::new("com.x.NoSource").with_method("fun f()")];
        let cache = p.cache(&backend);
        let plan = cache.plan(&contracts);
        assert!(plan.fallbacks.contains("com.x.NoSource"));
        assert!(cache.sink().contains(DiagnosticCode::STRUCTURAL_FALLBACK));
        assert!(!cache.sink().has_errors());
    }

    #[test]
    fn reap_deletes_and_compacts() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![
            p.contract("A", "interface A", &[]),
            p.contract("B", "interface B", &[]),
        ];
        let cache = p.cache(&backend);
        let plan = cache.plan(&contracts);
        for c in &contracts {
            let artifact = PathBuf::from(format!("Fake{}Impl.kt", c.simple_name()));
            std::fs::write(p.dir.path().join(&artifact), "class Fake").unwrap();
            let sig = plan.signature(&c.name).unwrap();
            cache.record_generation(c, &sig, vec![artifact]);
        }
        cache.record_generation(
            &contracts[0],
            &Signature::from_content(b"bump"),
            vec![PathBuf::from("FakeAImpl.kt")],
        );

        let current: BTreeSet<String> = ["com.x.A".to_string()].into();
        let report = cache.reap(&current);
        assert_eq!(report.stale, vec!["com.x.B"]);
        assert!(!p.dir.path().join("FakeBImpl.kt").exists());
        assert!(p.dir.path().join("FakeAImpl.kt").exists());
        // Header plus the single live record
        assert_eq!(backend.lines().len(), 2);
    }

    #[test]
    fn reap_compaction_failure_is_a_warning() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let contracts = vec![p.contract("A", "interface A", &[])];
        let cache = p.cache(&backend);
        let plan = cache.plan(&contracts);
        commit(&cache, &plan, &contracts);

        backend.fail_writes(true);
        let report = cache.reap(&BTreeSet::new());
        assert_eq!(report.stale, vec!["com.x.A"]);
        assert!(cache.sink().contains(DiagnosticCode::COMPACTION_FAILED));
    }

    #[test]
    fn reap_then_plan_regenerates_dependents_of_removed_contract() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let pass1 = vec![
            p.contract("A", "interface A", &["B"]),
            p.contract("B", "interface B", &[]),
        ];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&pass1);
            commit(&cache, &plan, &pass1);
        }

        // B disappears; the stale entry is reaped before the next plan
        let pass2 = vec![pass1[0].clone()];
        let current: BTreeSet<String> = ["com.x.A".to_string()].into();
        {
            let cache = p.cache(&backend);
            let report = cache.reap(&current);
            assert_eq!(report.stale, vec!["com.x.B"]);
            assert_eq!(report.invalidated, vec!["com.x.A"]);
        }

        let cache = p.cache(&backend);
        let plan = cache.plan(&pass2);
        assert!(plan.changes.removed.is_empty());
        assert_eq!(
            reason(&plan, "A"),
            Reason::DependencyChanged {
                cause: "com.x.B".into()
            }
        );
        let sig = plan.signature("com.x.A").unwrap();
        assert!(cache.needs_regeneration("com.x.A", &sig));

        commit(&cache, &plan, &pass2);
        assert!(!cache.needs_regeneration("com.x.A", &sig));
        assert!(p.cache(&backend).plan(&pass2).is_up_to_date());
    }

    #[test]
    fn reap_after_recording_does_not_invalidate_regenerated_dependents() {
        let p = Project::new();
        let backend = MemoryBackend::new();
        let pass1 = vec![
            p.contract("A", "interface A", &["B"]),
            p.contract("B", "interface B", &[]),
        ];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&pass1);
            commit(&cache, &plan, &pass1);
        }

        let pass2 = vec![pass1[0].clone()];
        {
            let cache = p.cache(&backend);
            let plan = cache.plan(&pass2);
            assert!(plan.needs_regeneration("com.x.A"));
            commit(&cache, &plan, &pass2);
            let report = cache.reap(&["com.x.A".to_string()].into());
            assert_eq!(report.stale, vec!["com.x.B"]);
            assert!(report.invalidated.is_empty());
        }

        assert!(p.cache(&backend).plan(&pass2).is_up_to_date());
    }

    #[test]
    fn reason_display() {
        assert_eq!(Reason::New.to_string(), "new");
        assert_eq!(
            Reason::DependencyChanged {
                cause: "com.x.B".into()
            }
            .to_string(),
            "dependency changed (com.x.B)"
        );
    }

    #[test]
    fn decision_serializes_flat() {
        let d = Decision {
            signature: Signature::from_content(b"x"),
            reason: Reason::DependencyChanged {
                cause: "com.x.B".into(),
            },
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["reason"], "dependency_changed");
        assert_eq!(json["cause"], "com.x.B");
    }
}
