//! Loading and atomically saving configuration documents
//!
//! A save never leaves a half-written file behind:
//!
//! ```text
//! render ─► write .<name>.*.tmp ─► fsync ─► read back + compare ─► rename over target
//!                 │                              │
//!                 └──────── any failure: temp file removed, target untouched
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::backup::{self, BackupLedger, BackupPolicy};
use crate::document::{Document, LoadReport, RawError};
use crate::error::{LoadError, SaveError};

/// A freshly loaded document and what the load repaired
#[derive(Debug, Clone)]
pub struct Loaded {
    /// The document, type hints applied
    pub document: Document,
    /// Repairs and warnings
    pub report: LoadReport,
}

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// File that was replaced
    pub path: PathBuf,
    /// Bytes written
    pub bytes: usize,
    /// Backup taken before this save, if any
    pub backup: Option<PathBuf>,
}

/// Counters for one store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Successful loads
    pub loads: u64,
    /// Successful saves
    pub saves: u64,
    /// Saves that failed
    pub failed_saves: u64,
    /// Backups written
    pub backups: u64,
}

#[derive(Debug, Default)]
struct Counters {
    loads: AtomicU64,
    saves: AtomicU64,
    failed_saves: AtomicU64,
    backups: AtomicU64,
}

/// YAML-backed document store
#[derive(Debug)]
pub struct YamlStore {
    backup: BackupPolicy,
    ledger: Arc<BackupLedger>,
    counters: Counters,
}

impl Default for YamlStore {
    fn default() -> Self {
        Self::new(BackupPolicy::default(), BackupLedger::process())
    }
}

impl YamlStore {
    /// Store with the given backup policy and ledger
    #[must_use]
    pub fn new(backup: BackupPolicy, ledger: Arc<BackupLedger>) -> Self {
        Self {
            backup,
            ledger,
            counters: Counters::default(),
        }
    }

    /// Backup policy in effect
    #[inline]
    #[must_use]
    pub fn backup_policy(&self) -> BackupPolicy {
        self.backup
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            loads: self.counters.loads.load(Ordering::Relaxed),
            saves: self.counters.saves.load(Ordering::Relaxed),
            failed_saves: self.counters.failed_saves.load(Ordering::Relaxed),
            backups: self.counters.backups.load(Ordering::Relaxed),
        }
    }

    /// Read, parse and type a configuration file
    ///
    /// # Errors
    /// [`LoadError::NotFound`] if the file is absent, [`LoadError::Io`] if it
    /// cannot be read, [`LoadError::Syntax`] / [`LoadError::Layout`] if it is
    /// not a configuration document. The file is never modified.
    pub fn load(&self, path: &Path) -> Result<Loaded, LoadError> {
        let text = fs::read_to_string(path).map_err(|e| LoadError::io_error(path, e))?;
        let loaded = Self::parse_str(path, &text)?;
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            path = %path.display(),
            keys = loaded.document.data.len(),
            hints = loaded.document.type_hints.len(),
            "loaded config"
        );
        Ok(loaded)
    }

    /// Parse configuration text as if it had been read from `path`
    ///
    /// # Errors
    /// [`LoadError::Syntax`] or [`LoadError::Layout`].
    pub fn parse_str(path: &Path, text: &str) -> Result<Loaded, LoadError> {
        let (mut document, mut report) = Document::parse_raw(text).map_err(|err| match err {
            RawError::Syntax(message) => LoadError::syntax_error(path, message),
            RawError::Layout(message) => LoadError::Layout {
                path: path.to_path_buf(),
                message,
            },
        })?;
        report.coercion_failures = document.apply_type_hints();

        for failure in &report.coercion_failures {
            tracing::warn!(path = %path.display(), error = %failure, "type hint not applied");
        }
        if report.legacy_layout {
            tracing::info!(path = %path.display(), "reading legacy layout without __data__");
        }
        if !report.dropped_duplicates.is_empty() {
            tracing::info!(
                path = %path.display(),
                keys = ?report.dropped_duplicates,
                "discarded duplicate keys"
            );
        }
        if report.shared_references > 0 {
            tracing::debug!(
                path = %path.display(),
                aliases = report.shared_references,
                "expanded shared references into copies"
            );
        }
        Ok(Loaded { document, report })
    }

    /// Atomically replace `path` with `document`
    ///
    /// `stamp` dates the once-per-process backup, if one is taken.
    ///
    /// # Errors
    /// Any [`SaveError`]; the previous file content is left intact.
    pub fn save(
        &self,
        path: &Path,
        document: &Document,
        stamp: NaiveDateTime,
    ) -> Result<SaveReport, SaveError> {
        let result = self.save_inner(path, document, stamp);
        match &result {
            Ok(report) => {
                self.counters.saves.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(path = %path.display(), bytes = report.bytes, "saved config");
            }
            Err(err) => {
                self.counters.failed_saves.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(path = %path.display(), error = %err, "save failed");
            }
        }
        result
    }

    fn save_inner(
        &self,
        path: &Path,
        document: &Document,
        stamp: NaiveDateTime,
    ) -> Result<SaveReport, SaveError> {
        let text = document.render().map_err(|e| SaveError::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| SaveError::io_error(&dir, e))?;

        let backup = self.maybe_backup(path, stamp);

        let name = path
            .file_name()
            .map_or_else(|| "config".into(), |n| n.to_string_lossy());
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| SaveError::io_error(&dir, e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| SaveError::io_error(tmp.path(), e))?;

        verify(tmp.path(), document)?;

        tmp.persist(path).map_err(|e| SaveError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        Ok(SaveReport {
            path: path.to_path_buf(),
            bytes: text.len(),
            backup,
        })
    }

    fn maybe_backup(&self, path: &Path, stamp: NaiveDateTime) -> Option<PathBuf> {
        if self.backup == BackupPolicy::Disabled || !path.is_file() || !self.ledger.claim(path) {
            return None;
        }
        match backup::write_backup(path, stamp) {
            Ok(target) => {
                self.counters.backups.fetch_add(1, Ordering::Relaxed);
                tracing::info!(path = %path.display(), backup = %target.display(), "backed up config");
                Some(target)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "backup failed, saving anyway");
                None
            }
        }
    }
}

fn verify(written: &Path, intended: &Document) -> Result<(), SaveError> {
    let fail = |message: String| SaveError::Verification {
        path: written.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(written).map_err(|e| SaveError::io_error(written, e))?;
    let (read_back, _) = Document::parse_raw(&text).map_err(|e| fail(e.to_string()))?;
    if read_back.data != intended.data.to_plain() {
        return Err(fail("data read back differs from data written".into()));
    }
    if read_back.type_hints != intended.type_hints {
        return Err(fail("type hints read back differ from hints written".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use confmgr_node::{ConfigPath, TypeHint, TypeHints, Value};
    use confmgr_test_utils::TempConfigDir;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn store() -> YamlStore {
        YamlStore::new(BackupPolicy::Disabled, Arc::new(BackupLedger::new()))
    }

    fn sample() -> Document {
        let mut doc = Document::empty();
        let when: ConfigPath = "started".parse().unwrap();
        doc.data.set_path(&when, stamp());
        doc.data.set_path(&"db.port".parse().unwrap(), 5432_i64);
        doc.type_hints.insert(&when, TypeHint::DateTime);
        doc
    }

    #[test]
    fn save_then_load_restores_types() {
        let dir = TempConfigDir::new();
        let path = dir.path("nested/dir/config.yaml");
        let store = store();

        let report = store.save(&path, &sample(), stamp()).unwrap();
        assert_eq!(report.path, path);
        assert!(report.backup.is_none());

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.document.data, sample().data);
        assert!(loaded.report.coercion_failures.is_empty());
        assert_eq!(store.stats().loads, 1);
        assert_eq!(store.stats().saves, 1);
    }

    #[test]
    fn saved_file_has_only_two_sections() {
        let dir = TempConfigDir::new();
        let path = dir.write("config.yaml", "legacy: 1\n");
        let store = store();
        let loaded = store.load(&path).unwrap();
        assert!(loaded.report.legacy_layout);
        store.save(&path, &loaded.document, stamp()).unwrap();

        let text = dir.read("config.yaml");
        assert!(text.starts_with("__data__:"));
        let raw: serde_yaml::Mapping = serde_yaml::from_str(&text).unwrap();
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempConfigDir::new();
        let err = store().load(&dir.path("absent.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn invalid_file_is_left_alone() {
        let dir = TempConfigDir::new();
        let path = dir.write("config.yaml", "a: [unclosed\n");
        let err = store().load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Syntax { .. }));
        assert_eq!(dir.read("config.yaml"), "a: [unclosed\n");

        let path = dir.write("list.yaml", "- 1\n");
        assert!(matches!(store().load(&path), Err(LoadError::Layout { .. })));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = TempConfigDir::new();
        let path = dir.path("config.yaml");
        store().save(&path, &sample(), stamp()).unwrap();
        store().save(&path, &sample(), stamp()).unwrap();
        let names = dir.file_names();
        assert_eq!(names, ["config.yaml"]);
    }

    #[test]
    fn backup_taken_once_per_ledger() {
        let dir = TempConfigDir::new();
        let path = dir.write("config.yaml", "__data__: {a: 1}\n__type_hints__: {}\n");
        let store = YamlStore::new(BackupPolicy::Timestamped, Arc::new(BackupLedger::new()));

        let first = store.save(&path, &sample(), stamp()).unwrap();
        let second = store.save(&path, &sample(), stamp()).unwrap();
        let backup = first.backup.expect("first save backs up");
        assert!(second.backup.is_none());
        assert_eq!(
            fs::read_to_string(&backup).unwrap(),
            "__data__: {a: 1}\n__type_hints__: {}\n"
        );
        assert_eq!(store.stats().backups, 1);
        assert_eq!(dir.backups().len(), 1);
    }

    #[test]
    fn no_backup_when_nothing_existed() {
        let dir = TempConfigDir::new();
        let store = YamlStore::new(BackupPolicy::Timestamped, Arc::new(BackupLedger::new()));
        let report = store.save(&dir.path("config.yaml"), &sample(), stamp()).unwrap();
        assert!(report.backup.is_none());
    }

    #[test]
    fn hints_round_trip_including_unknown_names() {
        let dir = TempConfigDir::new();
        let path = dir.path("config.yaml");
        let mut doc = Document::empty();
        doc.data.insert("price", "1.50");
        let mut hints = TypeHints::new();
        hints.insert_raw("price", "Decimal");
        doc.type_hints = hints;

        let store = store();
        store.save(&path, &doc, stamp()).unwrap();
        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.document.type_hints, doc.type_hints);
        assert_eq!(loaded.document.data.get("price"), Some(&Value::from("1.50")));
    }
}
