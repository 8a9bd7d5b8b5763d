//! Durable, append-only operation history.
//!
//! Every caller-facing action produces exactly one [`OperationEntry`]. The
//! [`OperationLog`] keeps the entries in memory and persists the whole
//! sequence through a [`LogStore`] after each append or clear, so the store
//! always reflects the last completed write.
//!
//! # Storage format
//! [`FileStore`] writes a self-describing JSON document:
//! ```json
//! { "format_version": "1.0", "entries": [ ... ] }
//! ```
//! and replaces it atomically on every save.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::fsutil::write_atomic;

/// Current on-disk format version.
pub const FORMAT_VERSION: &str = "1.0";

/// Kind of caller-facing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Load,
    /// Header-only read of a file
    Inspect,
    Clean,
    /// Numeric validation of chosen fields
    Validate,
    Transform,
    Analyze,
    /// Sales figures for a single product
    Product,
    Report,
    Export,
    Restore,
    Summary,
    History,
    HistoryClear,
}

impl OperationKind {
    /// Stable string form, identical to the serialized tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Inspect => "inspect",
            Self::Clean => "clean",
            Self::Validate => "validate",
            Self::Transform => "transform",
            Self::Analyze => "analyze",
            Self::Product => "product",
            Self::Report => "report",
            Self::Export => "export",
            Self::Restore => "restore",
            Self::Summary => "summary",
            Self::History => "history",
            Self::HistoryClear => "history_clear",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let kinds = [
            Self::Load,
            Self::Inspect,
            Self::Clean,
            Self::Validate,
            Self::Transform,
            Self::Analyze,
            Self::Product,
            Self::Report,
            Self::Export,
            Self::Restore,
            Self::Summary,
            Self::History,
            Self::HistoryClear,
        ];
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        kinds
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| PipelineError::invalid_argument(format!("Unknown operation kind '{}'", s)))
    }
}

/// Whether an operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Result of an operation as recorded in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    /// Successful outcome with an optional note.
    pub fn success(message: Option<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message,
        }
    }

    /// Failed outcome carrying the error text.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            message: Some(message.into()),
        }
    }

    /// Returns true for a successful outcome.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// An operation about to be recorded; the log assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub dataset: String,
    pub kind: OperationKind,
    pub parameters: BTreeMap<String, String>,
    pub outcome: Outcome,
}

impl NewOperation {
    /// Starts a successful operation record.
    pub fn new(kind: OperationKind, dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            kind,
            parameters: BTreeMap::new(),
            outcome: Outcome::success(None),
        }
    }

    /// Builder method to add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(name.into(), value.to_string());
        self
    }

    /// Builder method to set the outcome.
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// One recorded operation. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub id: Uuid,
    /// Dataset identifier; empty when no dataset was involved
    pub dataset: String,
    pub kind: OperationKind,
    pub parameters: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
}

impl OperationEntry {
    fn stamp(operation: NewOperation) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset: operation.dataset,
            kind: operation.kind,
            parameters: operation.parameters,
            timestamp: Utc::now(),
            outcome: operation.outcome,
        }
    }
}

impl fmt::Display for OperationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.outcome.status {
            OutcomeStatus::Success => "ok",
            OutcomeStatus::Failure => "FAILED",
        };
        let dataset = if self.dataset.is_empty() { "-" } else { &self.dataset };
        write!(
            f,
            "{} {:<13} {:<16} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind.as_str(),
            dataset,
            status
        )?;
        if !self.parameters.is_empty() {
            let params: Vec<String> = self
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " [{}]", params.join(", "))?;
        }
        if let Some(message) = &self.outcome.message {
            write!(f, " - {}", message)?;
        }
        Ok(())
    }
}

/// Persistent backing for an [`OperationLog`].
pub trait LogStore {
    /// Reads the persisted sequence; an absent store is an empty sequence.
    ///
    /// # Errors
    /// `CorruptHistory` if stored content cannot be decoded; `Io` if the
    /// store exists but cannot be read.
    fn load(&self) -> Result<Vec<OperationEntry>>;

    /// Replaces the persisted sequence with `entries`.
    ///
    /// # Errors
    /// `Persistence` if the write did not complete; prior content is intact.
    fn save(&mut self, entries: &[OperationEntry]) -> Result<()>;

    /// Human-readable location, for messages.
    fn location(&self) -> String;
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryDocument {
    format_version: String,
    entries: Vec<OperationEntry>,
}

/// JSON file store with atomic replacement.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at `path`; the file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves an unreadable history file aside and returns its new location.
    ///
    /// The file is renamed to `<name>.corrupt-<timestamp>` in the same
    /// directory so it can be inspected later.
    pub fn quarantine(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        let target = self.path.with_file_name(format!(
            "{}.corrupt-{}",
            file_name,
            Utc::now().format("%Y%m%dT%H%M%S%.3f")
        ));
        std::fs::rename(&self.path, &target).map_err(|e| {
            PipelineError::io(format!("Failed to move {} aside", self.path.display()), e)
        })?;
        warn!(
            "Moved unreadable history {} to {}",
            self.path.display(),
            target.display()
        );
        Ok(target)
    }

    fn corrupt(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::CorruptHistory {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl LogStore for FileStore {
    fn load(&self) -> Result<Vec<OperationEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No history at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(self.corrupt(e.to_string()));
            }
            Err(e) => {
                return Err(PipelineError::io(
                    format!("Failed to read {}", self.path.display()),
                    e,
                ));
            }
        };

        let document: HistoryDocument =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;
        if document.format_version != FORMAT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported format version '{}'",
                document.format_version
            )));
        }
        Ok(document.entries)
    }

    fn save(&mut self, entries: &[OperationEntry]) -> Result<()> {
        let document = HistoryDocument {
            format_version: FORMAT_VERSION.to_string(),
            entries: entries.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| PipelineError::persistence("Failed to serialize history", e))?;
        write_atomic(&self.path, &json).map_err(|e| {
            PipelineError::persistence(format!("Failed to write {}", self.path.display()), e)
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Vec<OperationEntry>,
    fail_writes: bool,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries`.
    pub fn with_entries(entries: Vec<OperationEntry>) -> Self {
        Self {
            saved: entries,
            fail_writes: false,
        }
    }

    /// Makes subsequent saves fail, simulating an unavailable disk.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// What was last saved.
    pub fn saved(&self) -> &[OperationEntry] {
        &self.saved
    }
}

impl LogStore for MemoryStore {
    fn load(&self) -> Result<Vec<OperationEntry>> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, entries: &[OperationEntry]) -> Result<()> {
        if self.fail_writes {
            return Err(PipelineError::persistence(
                "Memory store rejected the write",
                std::io::Error::other("writes disabled"),
            ));
        }
        self.saved = entries.to_vec();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Aggregate figures over the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStatistics {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub successes: usize,
    pub failures: usize,
    /// Distinct non-empty dataset identifiers
    pub datasets: BTreeSet<String>,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

impl fmt::Display for HistoryStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total operations: {}", self.total)?;
        writeln!(f, "Successful: {}", self.successes)?;
        writeln!(f, "Failed: {}", self.failures)?;
        writeln!(f, "Datasets: {}", self.datasets.len())?;
        if let (Some(first), Some(last)) = (self.first, self.last) {
            writeln!(f, "First: {}", first.format("%Y-%m-%d %H:%M:%S"))?;
            writeln!(f, "Last: {}", last.format("%Y-%m-%d %H:%M:%S"))?;
        }
        for (kind, count) in &self.by_kind {
            writeln!(f, "  {}: {}", kind, count)?;
        }
        Ok(())
    }
}

/// Ordered, persisted sequence of operation entries.
#[derive(Debug)]
pub struct OperationLog<S: LogStore> {
    store: S,
    entries: Vec<OperationEntry>,
    trusted: bool,
}

impl<S: LogStore> OperationLog<S> {
    /// Opens the log, reading existing entries from `store`.
    ///
    /// # Errors
    /// `CorruptHistory` if the store content cannot be read back.
    pub fn open(store: S) -> Result<Self> {
        let entries = store.load()?;
        debug!(
            "Opened history at {} with {} entries",
            store.location(),
            entries.len()
        );
        Ok(Self {
            store,
            entries,
            trusted: true,
        })
    }

    /// Starts an empty log on `store` without reading it.
    pub fn fresh(store: S) -> Self {
        Self {
            store,
            entries: Vec::new(),
            trusted: true,
        }
    }

    /// Records an operation and persists the full sequence.
    ///
    /// On a storage failure the entry stays in memory, the log is marked
    /// untrusted until the next successful write, and `Persistence` is
    /// returned.
    pub fn append(&mut self, operation: NewOperation) -> Result<OperationEntry> {
        let entry = OperationEntry::stamp(operation);
        self.entries.push(entry.clone());

        match self.store.save(&self.entries) {
            Ok(()) => {
                self.trusted = true;
                Ok(entry)
            }
            Err(e) => {
                self.trusted = false;
                Err(e)
            }
        }
    }

    /// False after a failed write, until a later write succeeds.
    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// All entries in insertion order.
    pub fn all(&self) -> &[OperationEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no operations are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `n` entries, oldest first.
    pub fn last(&self, n: usize) -> &[OperationEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Entries for one dataset.
    pub fn by_dataset(&self, dataset: &str) -> Vec<&OperationEntry> {
        self.entries.iter().filter(|e| e.dataset == dataset).collect()
    }

    /// Entries of one kind.
    pub fn by_kind(&self, kind: OperationKind) -> Vec<&OperationEntry> {
        self.entries.iter().filter(|e| e.kind == kind).collect()
    }

    /// Aggregate figures over all entries.
    pub fn statistics(&self) -> HistoryStatistics {
        let mut by_kind = BTreeMap::new();
        let mut successes = 0;
        let mut datasets = BTreeSet::new();
        for entry in &self.entries {
            *by_kind.entry(entry.kind.as_str().to_string()).or_insert(0) += 1;
            if entry.outcome.is_success() {
                successes += 1;
            }
            if !entry.dataset.is_empty() {
                datasets.insert(entry.dataset.clone());
            }
        }

        HistoryStatistics {
            total: self.entries.len(),
            by_kind,
            successes,
            failures: self.entries.len() - successes,
            datasets,
            first: self.entries.first().map(|e| e.timestamp),
            last: self.entries.last().map(|e| e.timestamp),
        }
    }

    /// Writes a human-readable listing of all entries to `path` atomically.
    ///
    /// # Errors
    /// `Io` if the file cannot be written; existing content is untouched.
    pub fn export(&self, path: &Path) -> Result<()> {
        let text = render_entries(&self.entries);
        write_atomic(path, text.as_bytes())?;
        debug!("Exported {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Removes every entry, persisting the empty sequence first.
    ///
    /// # Errors
    /// `Persistence` if the store rejects the write; nothing changes then.
    pub fn clear(&mut self) -> Result<()> {
        self.store.save(&[])?;
        self.entries.clear();
        self.trusted = true;
        Ok(())
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The backing store, mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Text listing of entries, one per line after a header.
pub fn render_entries(entries: &[OperationEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Operation history ({} entries)", entries.len());
    let _ = writeln!(out, "{}", "=".repeat(60));
    for entry in entries {
        let _ = writeln!(out, "{}", entry);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn op(kind: OperationKind, dataset: &str) -> NewOperation {
        NewOperation::new(kind, dataset)
    }

    #[test]
    fn test_append_stamps_entries() {
        let mut log = OperationLog::fresh(MemoryStore::new());
        let entry = log
            .append(op(OperationKind::Load, "sales").with_parameter("path", "sales.csv"))
            .unwrap();

        assert_eq!(entry.kind, OperationKind::Load);
        assert_eq!(entry.parameters["path"], "sales.csv");
        assert!(!entry.id.is_nil());
        assert_eq!(log.len(), 1);
        assert_eq!(log.store().saved(), log.all());
    }

    #[test]
    fn test_last_is_chronological() {
        let mut log = OperationLog::fresh(MemoryStore::new());
        for kind in [OperationKind::Load, OperationKind::Clean, OperationKind::Analyze] {
            log.append(op(kind, "d")).unwrap();
        }

        let kinds: Vec<OperationKind> = log.last(2).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![OperationKind::Clean, OperationKind::Analyze]);
        assert_eq!(log.last(10).len(), 3);
        assert!(log.last(0).is_empty());
    }

    #[test]
    fn test_failed_write_marks_untrusted_until_next_success() {
        let mut log = OperationLog::fresh(MemoryStore::new());
        log.store_mut().set_fail_writes(true);

        let result = log.append(op(OperationKind::Load, "d"));
        assert!(matches!(result, Err(PipelineError::Persistence { .. })));
        assert!(!log.is_trusted());
        assert_eq!(log.len(), 1);
        assert!(log.store().saved().is_empty());

        log.store_mut().set_fail_writes(false);
        log.append(op(OperationKind::Clean, "d")).unwrap();
        assert!(log.is_trusted());
        assert_eq!(log.store().saved().len(), 2);
    }

    #[test]
    fn test_clear_failure_changes_nothing() {
        let mut log = OperationLog::fresh(MemoryStore::new());
        log.append(op(OperationKind::Load, "d")).unwrap();
        log.store_mut().set_fail_writes(true);

        assert!(matches!(log.clear(), Err(PipelineError::Persistence { .. })));
        assert_eq!(log.len(), 1);
        assert_eq!(log.store().saved().len(), 1);

        log.store_mut().set_fail_writes(false);
        log.clear().unwrap();
        assert!(log.is_empty());
        assert!(log.store().saved().is_empty());
    }

    #[test]
    fn test_statistics_and_filters() {
        let mut log = OperationLog::fresh(MemoryStore::new());
        log.append(op(OperationKind::Load, "sales")).unwrap();
        log.append(op(OperationKind::Analyze, "sales").with_outcome(Outcome::failure("empty")))
            .unwrap();
        log.append(op(OperationKind::Load, "stock")).unwrap();
        log.append(op(OperationKind::History, "")).unwrap();

        let stats = log.statistics();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successes, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.by_kind["load"], 2);
        assert_eq!(stats.datasets.len(), 2);
        assert!(stats.first <= stats.last);

        assert_eq!(log.by_dataset("sales").len(), 2);
        assert_eq!(log.by_kind(OperationKind::Load).len(), 2);
    }

    #[test]
    fn test_kind_serializes_as_string() {
        let json = serde_json::to_string(&OperationKind::HistoryClear).unwrap();
        assert_eq!(json, "\"history_clear\"");
        assert_eq!(
            "history-clear".parse::<OperationKind>().unwrap(),
            OperationKind::HistoryClear
        );
        assert!("nope".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("history.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, r#"{"format_version": "9.9", "entries": []}"#).unwrap();

        let result = OperationLog::open(FileStore::new(&path));
        assert!(matches!(result, Err(PipelineError::CorruptHistory { .. })));
    }

    #[test]
    fn test_quarantine_moves_file_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.load(), Err(PipelineError::CorruptHistory { .. })));

        let moved = store.quarantine().unwrap();
        assert!(!path.exists());
        assert!(moved.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_render_entries() {
        let mut log = OperationLog::fresh(MemoryStore::new());
        log.append(op(OperationKind::Report, "sales").with_parameter("format", "json"))
            .unwrap();

        let text = render_entries(log.all());
        assert!(text.starts_with("Operation history (1 entries)"));
        assert!(text.contains("report"));
        assert!(text.contains("format=json"));
    }
}
