//! Persistent, append-only signature store shared by every build node.
//!
//! The store is a JSON Lines log. The first line is a header naming the
//! format version; each following line either records an entry for a contract
//! or forgets one, and the last line for a name wins:
//!
//! ```text
//! {"op":"header","format":1}
//! {"op":"record","name":"com.x.Repo","signature":"c:…","artifacts":[…],"depends_on":[…]}
//! {"op":"forget","name":"com.x.Gone"}
//! ```
//!
//! Loading is fail-safe: an unreadable or incompatible log yields an empty
//! store and a diagnostic, so the pass regenerates everything instead of
//! failing. Write failures are reported the same way.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use fakt_common::Signature;
use fakt_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::lock;

/// Current store format version. Logs with any other version are discarded.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// What the store remembers about one contract's last successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Signature of the contract when it was last generated.
    pub signature: Signature,

    /// Files generated for the contract, deleted when the contract disappears.
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,

    /// Contracts this contract depended on when it was last generated.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,

    /// A reaped contract this one depended on. Set until the contract is
    /// generated again; forces regeneration even if its signature matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidated_by: Option<String>,
}

impl StoreEntry {
    /// Creates an entry with no tracked artifacts or dependencies.
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            artifacts: Vec::new(),
            depends_on: BTreeSet::new(),
            invalidated_by: None,
        }
    }

    /// Sets the generated artifact paths.
    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Sets the dependency names.
    pub fn with_dependencies(mut self, depends_on: BTreeSet<String>) -> Self {
        self.depends_on = depends_on;
        self
    }
}

/// One line of the store log.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogRecord {
    Header {
        format: u32,
    },
    Record {
        name: String,
        signature: Signature,
        #[serde(default)]
        artifacts: Vec<PathBuf>,
        #[serde(default)]
        depends_on: BTreeSet<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        invalidated_by: Option<String>,
    },
    Forget {
        name: String,
    },
}

impl LogRecord {
    fn record(name: &str, entry: &StoreEntry) -> Self {
        LogRecord::Record {
            name: name.to_string(),
            signature: entry.signature,
            artifacts: entry.artifacts.clone(),
            depends_on: entry.depends_on.clone(),
            invalidated_by: entry.invalidated_by.clone(),
        }
    }

    fn to_line(&self) -> Result<String, CacheError> {
        let mut line = serde_json::to_string(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        line.push('\n');
        Ok(line)
    }
}

fn header_line() -> Result<String, CacheError> {
    LogRecord::Header {
        format: STORE_FORMAT_VERSION,
    }
    .to_line()
}

/// Durable backing for a [`SignatureStore`].
///
/// Implementations only move bytes. Parsing, locking across generation units,
/// and fail-safe degradation live in the store.
pub trait StoreBackend: Send + Sync {
    /// A stable identity shared by every backend over the same storage.
    fn identity(&self) -> String;

    /// The filesystem location, if the backing is a file.
    fn location(&self) -> Option<&Path> {
        None
    }

    /// Reads the whole log. Returns `Ok(None)` if it does not exist yet.
    fn read(&self) -> Result<Option<Vec<u8>>, CacheError>;

    /// Appends `data`, first writing `header` if the log is empty or missing.
    fn append(&self, data: &[u8], header: &[u8]) -> Result<(), CacheError>;

    /// Atomically replaces the whole log with `data`.
    fn replace(&self, data: &[u8]) -> Result<(), CacheError>;
}

/// A store log kept in a file, guarded by an advisory lock on a sidecar file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Creates a backend for the log at `path`. Nothing is touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the log path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn ensure_parent(&self) -> Result<(), CacheError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))
            }
            _ => Ok(()),
        }
    }
}

impl StoreBackend for FileBackend {
    fn identity(&self) -> String {
        let absolute = if self.path.is_absolute() {
            self.path.clone()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&self.path))
                .unwrap_or_else(|_| self.path.clone())
        };
        format!("file:{}", absolute.display())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn read(&self) -> Result<Option<Vec<u8>>, CacheError> {
        match std::fs::metadata(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            _ => {}
        }
        // Hold the lock so a concurrent append is never observed half-written.
        // A read-only location cannot be locked but can still be read.
        let _guard = lock::lock_exclusive(&self.sidecar(".lock")).ok();
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&self.path, e)),
        }
    }

    fn append(&self, data: &[u8], header: &[u8]) -> Result<(), CacheError> {
        self.ensure_parent()?;
        let _guard = lock::lock_exclusive(&self.sidecar(".lock"))?;
        let io_err = |e| CacheError::io(&self.path, e);

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(io_err)?;

        let len = file.metadata().map_err(io_err)?.len();
        let mut buf = Vec::with_capacity(header.len() + data.len() + 1);
        if len == 0 {
            buf.extend_from_slice(header);
        } else {
            // A torn previous write must not swallow this record.
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).map_err(io_err)?;
            file.read_exact(&mut last).map_err(io_err)?;
            if last[0] != b'\n' {
                buf.push(b'\n');
            }
        }
        buf.extend_from_slice(data);

        file.write_all(&buf).map_err(io_err)?;
        file.flush().map_err(io_err)
    }

    fn replace(&self, data: &[u8]) -> Result<(), CacheError> {
        self.ensure_parent()?;
        let _guard = lock::lock_exclusive(&self.sidecar(".lock"))?;
        let tmp = self.sidecar(".tmp");
        std::fs::write(&tmp, data).map_err(|e| CacheError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CacheError::io(&self.path, e))
    }
}

static MEMORY_IDS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct MemoryInner {
    id: usize,
    data: Mutex<Option<Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// An in-memory store log for tests.
///
/// Clones share the same log, which lets two stores model two passes over
/// one backing. Reads and writes can be made to fail on demand.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl MemoryBackend {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                id: MEMORY_IDS.fetch_add(1, Ordering::Relaxed),
                data: Mutex::new(None),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a log with the given raw contents.
    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        let backend = Self::new();
        *backend.inner.data.lock() = Some(contents.into());
        backend
    }

    /// Makes every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Makes every subsequent append or replace fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Returns the raw log contents.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.inner.data.lock().clone()
    }

    /// Returns the log as text, one entry per non-empty line.
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn simulated_failure(&self) -> CacheError {
        CacheError::io(
            format!("memory:{}", self.inner.id),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "simulated failure"),
        )
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryBackend {
    fn identity(&self) -> String {
        format!("memory:{}", self.inner.id)
    }

    fn read(&self) -> Result<Option<Vec<u8>>, CacheError> {
        if self.inner.fail_reads.load(Ordering::Relaxed) {
            return Err(self.simulated_failure());
        }
        Ok(self.inner.data.lock().clone())
    }

    fn append(&self, data: &[u8], header: &[u8]) -> Result<(), CacheError> {
        if self.inner.fail_writes.load(Ordering::Relaxed) {
            return Err(self.simulated_failure());
        }
        let mut guard = self.inner.data.lock();
        let log = guard.get_or_insert_with(Vec::new);
        if log.is_empty() {
            log.extend_from_slice(header);
        } else if log.last() != Some(&b'\n') {
            log.push(b'\n');
        }
        log.extend_from_slice(data);
        Ok(())
    }

    fn replace(&self, data: &[u8]) -> Result<(), CacheError> {
        if self.inner.fail_writes.load(Ordering::Relaxed) {
            return Err(self.simulated_failure());
        }
        *self.inner.data.lock() = Some(data.to_vec());
        Ok(())
    }
}

/// Result of recording an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The identical entry was already recorded; nothing was written.
    Unchanged,
    /// The entry was recorded and durably appended.
    Persisted,
    /// The entry was recorded in memory only because the write failed.
    MemoryOnly,
}

/// Outcome of parsing a log.
struct ParsedLog {
    entries: BTreeMap<String, StoreEntry>,
    skipped: usize,
    missing_header: bool,
}

fn parse_log(bytes: &[u8]) -> Result<ParsedLog, CacheError> {
    let text = std::str::from_utf8(bytes).map_err(|e| CacheError::IncompatibleFormat {
        expected: STORE_FORMAT_VERSION,
        found: format!("non-UTF-8 content ({e})"),
    })?;

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let mut parsed = ParsedLog {
        entries: BTreeMap::new(),
        skipped: 0,
        missing_header: false,
    };

    match lines.next() {
        None => {
            // A zero-length log gets its header from the next append
            parsed.missing_header = !bytes.is_empty();
            return Ok(parsed);
        }
        Some(first) => match serde_json::from_str::<LogRecord>(first) {
            Ok(LogRecord::Header { format }) if format == STORE_FORMAT_VERSION => {}
            Ok(LogRecord::Header { format }) => {
                return Err(CacheError::IncompatibleFormat {
                    expected: STORE_FORMAT_VERSION,
                    found: format!("format {format}"),
                });
            }
            _ => {
                return Err(CacheError::IncompatibleFormat {
                    expected: STORE_FORMAT_VERSION,
                    found: "no header".to_string(),
                });
            }
        },
    }

    for line in lines {
        match serde_json::from_str::<LogRecord>(line) {
            Ok(LogRecord::Record {
                name,
                signature,
                artifacts,
                depends_on,
                invalidated_by,
            }) => {
                parsed.entries.insert(
                    name,
                    StoreEntry {
                        signature,
                        artifacts,
                        depends_on,
                        invalidated_by,
                    },
                );
            }
            Ok(LogRecord::Forget { name }) => {
                parsed.entries.remove(&name);
            }
            Ok(LogRecord::Header { .. }) => {}
            Err(_) => parsed.skipped += 1,
        }
    }

    Ok(parsed)
}

/// Contract name to last-recorded signature, persisted across passes.
///
/// Reads are served from memory after a one-time lazy load and need no
/// coordination. Every mutation takes the process-global lock for this store's
/// identity, so independent generation units sharing one backing never
/// interleave their appends.
pub struct SignatureStore {
    backend: Box<dyn StoreBackend>,
    sink: Arc<DiagnosticSink>,
    entries: RwLock<BTreeMap<String, StoreEntry>>,
    loaded: OnceCell<()>,
    needs_rewrite: AtomicBool,
}

impl SignatureStore {
    /// Creates a store over the given backend. The log is read on first use.
    pub fn new(backend: Box<dyn StoreBackend>, sink: Arc<DiagnosticSink>) -> Self {
        Self {
            backend,
            sink,
            entries: RwLock::new(BTreeMap::new()),
            loaded: OnceCell::new(),
            needs_rewrite: AtomicBool::new(false),
        }
    }

    /// Creates a store backed by the log file at `path`.
    pub fn open(path: impl Into<PathBuf>, sink: Arc<DiagnosticSink>) -> Self {
        Self::new(Box::new(FileBackend::new(path)), sink)
    }

    /// Creates a store backed by a fresh in-memory log.
    pub fn in_memory(sink: Arc<DiagnosticSink>) -> Self {
        Self::new(Box::new(MemoryBackend::new()), sink)
    }

    /// Returns the identity of the backing storage.
    pub fn identity(&self) -> String {
        self.backend.identity()
    }

    /// Returns the log file path, if file-backed.
    pub fn location(&self) -> Option<&Path> {
        self.backend.location()
    }

    /// Reads the log into memory if that has not happened yet.
    ///
    /// Never fails. An unreadable or incompatible log leaves the store empty,
    /// emits a diagnostic, and is rewritten on the next mutation.
    pub fn load(&self) {
        self.loaded.get_or_init(|| self.load_from_backend());
    }

    fn load_from_backend(&self) {
        let bytes = match self.backend.read() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(store = %self.identity(), "no signature store yet");
                return;
            }
            Err(e) => {
                self.needs_rewrite.store(true, Ordering::Relaxed);
                self.sink.emit(self.diagnostic(
                    Diagnostic::warning(
                        DiagnosticCode::CACHE_UNREADABLE,
                        "signature store is unreadable; every contract will be regenerated",
                    )
                    .with_note(e.to_string()),
                ));
                return;
            }
        };

        match parse_log(&bytes) {
            Ok(parsed) => {
                if parsed.missing_header {
                    self.needs_rewrite.store(true, Ordering::Relaxed);
                }
                if parsed.skipped > 0 {
                    self.sink.emit(self.diagnostic(
                        Diagnostic::warning(
                            DiagnosticCode::CACHE_RECORDS_DISCARDED,
                            format!(
                                "discarded {} malformed signature record(s)",
                                parsed.skipped
                            ),
                        )
                        .with_note("the affected contracts will be regenerated"),
                    ));
                }
                tracing::debug!(
                    store = %self.identity(),
                    entries = parsed.entries.len(),
                    "loaded signature store"
                );
                *self.entries.write() = parsed.entries;
            }
            Err(e) => {
                self.needs_rewrite.store(true, Ordering::Relaxed);
                self.sink.emit(self.diagnostic(
                    Diagnostic::warning(
                        DiagnosticCode::CACHE_RECORDS_DISCARDED,
                        "signature store has an incompatible format; every contract will be regenerated",
                    )
                    .with_note(e.to_string()),
                ));
            }
        }
    }

    fn diagnostic(&self, diag: Diagnostic) -> Diagnostic {
        match self.location() {
            Some(path) => diag.with_path(path),
            None => diag,
        }
    }

    /// Returns `true` if `name` has no recorded signature, a different one, or
    /// was invalidated by a reaped dependency.
    pub fn needs_regeneration(&self, name: &str, signature: &Signature) -> bool {
        self.load();
        self.entries.read().get(name).map_or(true, |entry| {
            entry.signature != *signature || entry.invalidated_by.is_some()
        })
    }

    /// Returns the recorded entry for `name`.
    pub fn get(&self, name: &str) -> Option<StoreEntry> {
        self.load();
        self.entries.read().get(name).cloned()
    }

    /// Returns all recorded contract names, sorted.
    pub fn names(&self) -> BTreeSet<String> {
        self.load();
        self.entries.read().keys().cloned().collect()
    }

    /// Returns a copy of all recorded entries.
    pub fn snapshot(&self) -> BTreeMap<String, StoreEntry> {
        self.load();
        self.entries.read().clone()
    }

    /// Returns the number of recorded contracts.
    pub fn len(&self) -> usize {
        self.load();
        self.entries.read().len()
    }

    /// Returns `true` if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records a new signature for `name`, keeping any tracked artifacts and dependencies.
    pub fn record_generation(&self, name: &str, signature: &Signature) -> RecordOutcome {
        let entry = match self.get(name) {
            Some(existing) => StoreEntry {
                signature: *signature,
                invalidated_by: None,
                ..existing
            },
            None => StoreEntry::new(*signature),
        };
        self.record(name, entry)
    }

    /// Records `entry` for `name`, replacing any previous entry.
    ///
    /// Idempotent: recording an identical entry writes nothing. A failed write
    /// is reported as a diagnostic and the entry is still kept in memory.
    pub fn record(&self, name: &str, entry: StoreEntry) -> RecordOutcome {
        self.load();
        let lock = lock::store_lock(&self.identity());
        let _guard = lock.lock();

        {
            let mut entries = self.entries.write();
            if entries.get(name) == Some(&entry) {
                return RecordOutcome::Unchanged;
            }
            entries.insert(name.to_string(), entry.clone());
        }

        tracing::trace!(contract = name, signature = %entry.signature, "recording signature");
        if self.persist(&LogRecord::record(name, &entry)) {
            RecordOutcome::Persisted
        } else {
            RecordOutcome::MemoryOnly
        }
    }

    /// Marks the entry for `name` as invalidated by the removed contract `cause`.
    ///
    /// The mark is persisted and cleared by the next recording of `name`.
    /// Returns `None` if nothing is recorded for `name`; an entry that is
    /// already marked keeps its first cause.
    pub fn invalidate(&self, name: &str, cause: &str) -> Option<RecordOutcome> {
        let entry = self.get(name)?;
        if entry.invalidated_by.is_some() {
            return Some(RecordOutcome::Unchanged);
        }
        Some(self.record(
            name,
            StoreEntry {
                invalidated_by: Some(cause.to_string()),
                ..entry
            },
        ))
    }

    /// Removes the entry for `name`, returning it if one existed.
    pub fn forget(&self, name: &str) -> Option<StoreEntry> {
        self.load();
        let lock = lock::store_lock(&self.identity());
        let _guard = lock.lock();

        let removed = self.entries.write().remove(name)?;
        self.persist(&LogRecord::Forget {
            name: name.to_string(),
        });
        Some(removed)
    }

    /// Rewrites the log so it holds exactly one record per live entry.
    ///
    /// The log is re-read first so records appended by other stores over the
    /// same backing survive. If it cannot be parsed, the in-memory state wins.
    pub fn compact(&self) -> Result<(), CacheError> {
        self.load();
        let lock = lock::store_lock(&self.identity());
        let _guard = lock.lock();
        if let Ok(Some(bytes)) = self.backend.read() {
            if let Ok(parsed) = parse_log(&bytes) {
                if !bytes.is_empty() && !parsed.missing_header {
                    *self.entries.write() = parsed.entries;
                }
            }
        }
        self.rewrite()
    }

    /// Writes one mutation through to the backend. Caller holds the store lock.
    fn persist(&self, record: &LogRecord) -> bool {
        let result = if self.needs_rewrite.load(Ordering::Relaxed) {
            self.rewrite()
        } else {
            record
                .to_line()
                .and_then(|line| Ok((line, header_line()?)))
                .and_then(|(line, header)| {
                    self.backend.append(line.as_bytes(), header.as_bytes())
                })
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                self.sink.emit(self.diagnostic(
                    Diagnostic::warning(
                        DiagnosticCode::CACHE_WRITE_FAILED,
                        "failed to persist signature record",
                    )
                    .with_note(e.to_string())
                    .with_help("generated output is unaffected; the next pass may redo work"),
                ));
                false
            }
        }
    }

    /// Replaces the log with the in-memory state. Caller holds the store lock.
    fn rewrite(&self) -> Result<(), CacheError> {
        let mut out = header_line()?;
        for (name, entry) in self.entries.read().iter() {
            out.push_str(&LogRecord::record(name, entry).to_line()?);
        }
        self.backend.replace(out.as_bytes())?;
        self.needs_rewrite.store(false, Ordering::Relaxed);
        Ok(())
    }
}
