//! Multi-pass behavior of the generation cache over a real store file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fakt_cache::{GenerationCache, Reason, DEFAULT_STORE_FILE};
use fakt_common::Contract;
use fakt_diagnostics::{DiagnosticCode, DiagnosticSink};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        Self { dir }
    }

    fn store_path(&self) -> PathBuf {
        self.dir.path().join("cache").join(DEFAULT_STORE_FILE)
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn write_source(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join("src").join(format!("{name}.kt"));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn contract(&self, name: &str, deps: &[&str]) -> Contract {
        let mut c = Contract::new(format!("com.example.{name}"))
            .with_source(self.dir.path().join("src").join(format!("{name}.kt")));
        for d in deps {
            c = c.depending_on(format!("com.example.{d}"));
        }
        c
    }

    fn open(&self) -> GenerationCache {
        GenerationCache::open(self.store_path(), self.out(), Arc::new(DiagnosticSink::new()))
    }

    /// Runs one pass: plan, "generate" every miss, record, reap.
    fn pass(&self, contracts: &[Contract]) -> Vec<String> {
        let cache = self.open();
        let plan = cache.plan(contracts);
        let mut generated = Vec::new();
        for c in contracts {
            if !plan.needs_regeneration(&c.name) {
                continue;
            }
            let artifact = PathBuf::from(format!("Fake{}Impl.kt", c.simple_name()));
            std::fs::write(self.out().join(&artifact), format!("// fake for {}", c.name)).unwrap();
            let sig = plan.signature(&c.name).unwrap();
            cache.record_generation(c, &sig, vec![artifact]);
            generated.push(c.simple_name().to_string());
        }
        let current: BTreeSet<String> = contracts.iter().map(|c| c.name.clone()).collect();
        cache.reap(&current);
        generated
    }
}

fn exists(dir: &Path, file: &str) -> bool {
    dir.join(file).exists()
}

#[test]
fn unchanged_second_pass_generates_nothing() {
    let ws = Workspace::new();
    ws.write_source("UserRepository", "interface UserRepository { fun find(id: Long): User }");
    ws.write_source("User", "interface User { val id: Long }");
    let contracts = vec![
        ws.contract("UserRepository", &["User"]),
        ws.contract("User", &[]),
    ];

    assert_eq!(ws.pass(&contracts).len(), 2);
    assert!(ws.pass(&contracts).is_empty());
}

#[test]
fn whitespace_edit_regenerates_contract_and_dependents() {
    let ws = Workspace::new();
    ws.write_source("UserRepository", "interface UserRepository");
    ws.write_source("User", "interface User");
    ws.write_source("Clock", "interface Clock");
    let contracts = vec![
        ws.contract("UserRepository", &["User"]),
        ws.contract("User", &[]),
        ws.contract("Clock", &[]),
    ];
    ws.pass(&contracts);

    ws.write_source("User", "interface  User");
    let generated = ws.pass(&contracts);
    assert_eq!(generated, vec!["UserRepository", "User"]);
}

#[test]
fn removed_contract_is_reaped_across_passes() {
    let ws = Workspace::new();
    ws.write_source("A", "interface A");
    ws.write_source("B", "interface B");
    ws.write_source("C", "interface C");
    let all = vec![
        ws.contract("A", &[]),
        ws.contract("B", &[]),
        ws.contract("C", &[]),
    ];
    ws.pass(&all);
    assert!(exists(&ws.out(), "FakeBImpl.kt"));

    let remaining = vec![all[0].clone(), all[2].clone()];
    assert!(ws.pass(&remaining).is_empty());
    assert!(!exists(&ws.out(), "FakeBImpl.kt"));
    assert!(exists(&ws.out(), "FakeAImpl.kt"));
    assert!(exists(&ws.out(), "FakeCImpl.kt"));

    let cache = ws.open();
    let names: Vec<String> = cache.store().names().into_iter().collect();
    assert_eq!(names, vec!["com.example.A", "com.example.C"]);

    // B coming back is new again
    let plan = cache.plan(&all);
    assert_eq!(plan.decisions["com.example.B"].reason, Reason::New);
}

#[test]
fn corrupted_store_file_regenerates_everything() {
    let ws = Workspace::new();
    ws.write_source("A", "interface A");
    let contracts = vec![ws.contract("A", &[])];
    ws.pass(&contracts);

    std::fs::write(ws.store_path(), b"\xff\xfe garbage \x00").unwrap();

    let sink = Arc::new(DiagnosticSink::new());
    let cache = GenerationCache::open(ws.store_path(), ws.out(), Arc::clone(&sink));
    let plan = cache.plan(&contracts);
    assert!(plan.needs_regeneration("com.example.A"));
    assert!(sink.contains(DiagnosticCode::CACHE_RECORDS_DISCARDED));
    assert!(!sink.has_errors());

    // The next record rewrites the log, so the pass after that hits again
    let sig = plan.signature("com.example.A").unwrap();
    cache.record_generation(&contracts[0], &sig, Vec::new());
    assert!(ws.pass(&contracts).is_empty());
}

#[test]
fn store_file_is_json_lines_with_header() {
    let ws = Workspace::new();
    ws.write_source("A", "interface A");
    ws.pass(&[ws.contract("A", &[])]);

    let text = std::fs::read_to_string(ws.store_path()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["op"], "header");
    assert_eq!(lines[0]["format"], 1);
    assert_eq!(lines[1]["op"], "record");
    assert_eq!(lines[1]["name"], "com.example.A");
    assert!(lines[1]["signature"].as_str().unwrap().starts_with("c:"));
    assert_eq!(lines[1]["artifacts"][0], "FakeAImpl.kt");
}
