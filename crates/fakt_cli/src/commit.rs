//! `fakt commit`: record signatures after a successful generation pass.

use std::sync::Arc;

use fakt_cache::RecordOutcome;
use fakt_common::Contract;
use fakt_diagnostics::DiagnosticSink;
use serde::Serialize;

use crate::pipeline::{exit_code, print_json, render_diagnostics, Project};
use crate::{ContractArgs, GlobalArgs, ReportFormat};

#[derive(Debug, Default, Serialize)]
struct CommitReport {
    persisted: Vec<String>,
    unchanged: Vec<String>,
    memory_only: Vec<String>,
    cache_enabled: bool,
}

/// Runs the `fakt commit` command.
///
/// Records the current signature, artifacts and dependencies of every
/// contract in the file. Recording an identical entry again writes nothing.
pub fn run(args: &ContractArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let sink = Arc::new(DiagnosticSink::new());

    let location = project.locate(&args.node, &sink)?;
    let records = project.load_contracts(&args.contracts)?;
    let cache = project.open_cache(&location, Arc::clone(&sink));

    let contracts: Vec<Contract> = records.iter().map(|r| r.contract.clone()).collect();
    let plan = cache.plan(&contracts);

    let mut report = CommitReport {
        cache_enabled: cache.is_enabled(),
        ..CommitReport::default()
    };
    for record in records {
        let name = record.contract.name.clone();
        let Some(signature) = plan.signature(&name) else {
            continue;
        };
        match cache.record_generation(&record.contract, &signature, record.artifacts) {
            Some(RecordOutcome::Persisted) => report.persisted.push(name),
            Some(RecordOutcome::Unchanged) => report.unchanged.push(name),
            Some(RecordOutcome::MemoryOnly) => report.memory_only.push(name),
            None => {}
        }
    }

    match global.format {
        ReportFormat::Text => {
            if !global.quiet {
                if report.cache_enabled {
                    eprintln!(
                        "   Committed {} recorded, {} unchanged, {} not persisted ({})",
                        report.persisted.len(),
                        report.unchanged.len(),
                        report.memory_only.len(),
                        location.store_path.display()
                    );
                } else {
                    eprintln!("   Committed nothing; caching is disabled");
                }
            }
        }
        ReportFormat::Json => print_json(&report)?,
    }

    render_diagnostics(&sink, global);
    Ok(exit_code(&sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{global_for, sample_project};

    fn commit(dir: &std::path::Path, node: &str) -> i32 {
        let args = ContractArgs {
            node: node.into(),
            contracts: dir.join("contracts.json"),
        };
        run(&args, &global_for(dir)).unwrap()
    }

    #[test]
    fn commit_writes_the_owner_store() {
        let dir = sample_project();
        std::fs::write(
            dir.path().join("contracts.json"),
            r#"[{"name": "com.x.A", "artifacts": ["com/x/FakeAImpl.kt"]}]"#,
        )
        .unwrap();
        assert_eq!(commit(dir.path(), "jvmTest"), 0);

        let store = dir
            .path()
            .join("build/generated/fakt/commonTest/cache/signatures.jsonl");
        let text = std::fs::read_to_string(&store).unwrap();
        assert!(text.contains("com.x.A"));
        assert!(text.contains("FakeAImpl.kt"));
    }

    #[test]
    fn repeated_commit_appends_nothing() {
        let dir = sample_project();
        std::fs::write(dir.path().join("contracts.json"), r#"[{"name": "com.x.A"}]"#).unwrap();
        commit(dir.path(), "iosTest");
        let store = dir
            .path()
            .join("build/generated/fakt/commonTest/cache/signatures.jsonl");
        let first = std::fs::read_to_string(&store).unwrap();
        commit(dir.path(), "jvmTest");
        assert_eq!(std::fs::read_to_string(&store).unwrap(), first);
    }

    #[test]
    fn disabled_cache_writes_no_store() {
        let dir = sample_project();
        let config = std::fs::read_to_string(dir.path().join("fakt.toml")).unwrap();
        std::fs::write(
            dir.path().join("fakt.toml"),
            format!("{config}\n[cache]\nenabled = false\n"),
        )
        .unwrap();
        std::fs::write(dir.path().join("contracts.json"), r#"[{"name": "com.x.A"}]"#).unwrap();
        assert_eq!(commit(dir.path(), "jvmTest"), 0);
        assert!(!dir.path().join("build/generated/fakt/commonTest/cache").exists());
    }
}
