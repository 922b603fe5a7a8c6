//! `fakt plan`: which contracts of a pass need regeneration, and why.

use std::collections::BTreeMap;
use std::sync::Arc;

use fakt_cache::Decision;
use fakt_common::Contract;
use fakt_diagnostics::DiagnosticSink;
use serde::Serialize;

use crate::pipeline::{exit_code, print_json, render_diagnostics, Project};
use crate::{ContractArgs, GlobalArgs, ReportFormat};

#[derive(Serialize)]
struct PlanReport<'a> {
    node: &'a str,
    owner: &'a str,
    regenerate: Vec<&'a str>,
    removed: &'a [String],
    contracts: &'a BTreeMap<String, Decision>,
}

/// Runs the `fakt plan` command.
///
/// Reads the analyzer's contracts, compares them with the owning node's
/// signature store and prints a decision per contract. The store is not
/// modified.
pub fn run(args: &ContractArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let sink = Arc::new(DiagnosticSink::new());

    let location = project.locate(&args.node, &sink)?;
    let records = project.load_contracts(&args.contracts)?;
    let contracts: Vec<Contract> = records.into_iter().map(|r| r.contract).collect();

    if !global.quiet && global.format == ReportFormat::Text {
        eprintln!(
            "    Planning {} ({} contracts, store owned by {})",
            location.node,
            contracts.len(),
            location.owner
        );
    }

    let cache = project.open_cache(&location, Arc::clone(&sink));
    let plan = cache.plan(&contracts);

    match global.format {
        ReportFormat::Text => {
            for (name, decision) in &plan.decisions {
                let verb = if decision.reason.needs_regeneration() {
                    "regenerate"
                } else {
                    "skip"
                };
                println!("{verb:<10} {name} ({})", decision.reason);
            }
            for name in &plan.changes.removed {
                println!("{:<10} {name}", "removed");
            }
            if !global.quiet {
                eprintln!(
                    "    Finished {} to regenerate, {} up to date, {} removed",
                    plan.to_regenerate().len(),
                    plan.decisions.len() - plan.to_regenerate().len(),
                    plan.changes.removed.len()
                );
            }
        }
        ReportFormat::Json => print_json(&PlanReport {
            node: &location.node,
            owner: &location.owner,
            regenerate: plan.to_regenerate(),
            removed: &plan.changes.removed,
            contracts: &plan.decisions,
        })?,
    }

    render_diagnostics(&sink, global);
    Ok(exit_code(&sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{global_for, sample_project};
    use std::path::Path;

    fn write_contracts(dir: &Path, json: &str) -> std::path::PathBuf {
        let path = dir.join("contracts.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn plans_without_touching_the_store() {
        let dir = sample_project();
        let contracts = write_contracts(dir.path(), r#"[{"name": "com.x.A"}]"#);
        let args = ContractArgs {
            node: "jvmTest".into(),
            contracts,
        };
        assert_eq!(run(&args, &global_for(dir.path())).unwrap(), 0);
        assert!(!dir
            .path()
            .join("build/generated/fakt/commonTest/cache/signatures.jsonl")
            .exists());
    }

    #[test]
    fn missing_contracts_file_is_an_error() {
        let dir = sample_project();
        let args = ContractArgs {
            node: "jvmTest".into(),
            contracts: dir.path().join("absent.json"),
        };
        assert!(run(&args, &global_for(dir.path())).is_err());
    }

    #[test]
    fn json_plan_succeeds() {
        let dir = sample_project();
        let contracts = write_contracts(
            dir.path(),
            r#"[{"name": "com.x.A"}, {"name": "com.x.B", "depends_on": ["com.x.A"]}]"#,
        );
        let mut global = global_for(dir.path());
        global.format = ReportFormat::Json;
        let args = ContractArgs {
            node: "iosTest".into(),
            contracts,
        };
        assert_eq!(run(&args, &global).unwrap(), 0);
    }
}
