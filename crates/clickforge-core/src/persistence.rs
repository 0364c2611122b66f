//! Save records, storage backends and save/load on the engine.
//!
//! A save is one named record holding `{state, configVersion, timestamp}` as
//! JSON. Exports wrap the same fields plus an integer format `version` in
//! standard base64, so a save can be pasted between installations.
//!
//! Every failure is returned as a [`PersistenceError`] *and* reported through
//! an `Error` notification. A failed save or load leaves the state untouched.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::elapsed_secs;
use crate::engine::{Engine, Pass};
use crate::event::Event;
use crate::state::GameState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current export format version. Increment when breaking the export layout.
pub const EXPORT_VERSION: u32 = 2;

/// Offline gaps at or below this many seconds are not credited.
const MIN_OFFLINE_SECONDS: f64 = 1.0;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by a [`Storage`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("record '{key}' needs {needed} bytes, quota is {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },
    #[error("invalid record key '{0}'")]
    InvalidKey(String),
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from saving, loading, exporting or importing.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("save encoding failed: {0}")]
    Encode(String),
    #[error("save decoding failed: {0}")]
    Decode(String),
    #[error("export is not valid base64: {0}")]
    Base64(String),
    #[error("unsupported export version: expected {EXPORT_VERSION}, got {0}")]
    UnsupportedExportVersion(u64),
    #[error("malformed export: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The persisted save record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub state: GameState,
    #[serde(rename = "configVersion")]
    pub config_version: String,
    /// Epoch milliseconds when the record was written.
    pub timestamp: i64,
}

/// A save record tagged with the export format version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(flatten)]
    pub record: SaveRecord,
    pub version: u32,
}

/// What a load or import did.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// No record under the save key; state untouched.
    NoSave,
    /// State replaced. `offline_seconds` is the production credit granted.
    Loaded { offline_seconds: f64 },
    /// The record was written by another configuration version and rejected.
    VersionMismatch { saved: String, current: String },
}

// ---------------------------------------------------------------------------
// Storage backends
// ---------------------------------------------------------------------------

/// A key-value store for save records.
pub trait Storage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing record is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: HashMap<String, String>,
    quota: Option<usize>,
    unavailable: bool,
}

/// In-process storage. Clones share the same records, so a host (or a test)
/// can keep a handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes whose value is longer than `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        let storage = Self::new();
        storage.inner.borrow_mut().quota = Some(quota);
        storage
    }

    /// Make every operation fail with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.borrow_mut().unavailable = unavailable;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().records.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.borrow().records.get(key).cloned()
    }

    /// Store a raw record, bypassing quota and availability.
    pub fn insert(&self, key: &str, value: &str) {
        self.inner
            .borrow_mut()
            .records
            .insert(key.to_string(), value.to_string());
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.inner.borrow().unavailable {
            return Err(StorageError::Unavailable("memory storage disabled".into()));
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.get(key))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut inner = self.inner.borrow_mut();
        if let Some(quota) = inner.quota
            && value.len() > quota
        {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed: value.len(),
                quota,
            });
        }
        inner.records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.inner.borrow_mut().records.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per record inside a directory. The directory is
/// created on first write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\']);
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(key)?) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine save/load
// ---------------------------------------------------------------------------

impl Engine {
    /// Write the current state under the configured save key. Returns the
    /// save timestamp.
    pub fn save(&mut self) -> Result<i64, PersistenceError> {
        let saved = self.apply_save();
        self.flush();
        saved
    }

    pub(crate) fn apply_save(&mut self) -> Result<i64, PersistenceError> {
        let now = self.clock.now_ms();
        let record = self.record_at(now);
        let encoded = serde_json::to_string(&record)
            .map_err(|e| PersistenceError::Encode(e.to_string()))
            .map_err(|err| self.persistence_failed("save", err))?;
        if let Err(err) = self.storage.write(&self.config.save_key, &encoded) {
            return Err(self.persistence_failed("save", err.into()));
        }

        self.state.timestamps.last_save = Some(now);
        debug!(key = %self.config.save_key, bytes = encoded.len(), "game saved");
        self.emit(Event::Save { timestamp: now });
        Ok(now)
    }

    /// Restore the record under the save key, if any.
    ///
    /// A record from a different configuration version is rejected: state is
    /// left as it was and a `VersionMismatch` notification carries both
    /// versions.
    pub fn load(&mut self) -> Result<LoadOutcome, PersistenceError> {
        let outcome = self.apply_load();
        self.flush();
        outcome
    }

    fn apply_load(&mut self) -> Result<LoadOutcome, PersistenceError> {
        let text = match self.storage.read(&self.config.save_key) {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(LoadOutcome::NoSave),
            Err(err) => return Err(self.persistence_failed("load", err.into())),
        };
        let record: SaveRecord = serde_json::from_str(&text)
            .map_err(|e| PersistenceError::Decode(e.to_string()))
            .map_err(|err| self.persistence_failed("load", err))?;
        Ok(self.accept(record))
    }

    /// The save record as portable base64 text.
    pub fn export_save(&mut self) -> Result<String, PersistenceError> {
        let now = self.clock.now_ms();
        let export = ExportRecord {
            record: self.record_at(now),
            version: EXPORT_VERSION,
        };
        let json = match serde_json::to_string(&export) {
            Ok(json) => json,
            Err(err) => {
                let err = self.persistence_failed("export", PersistenceError::Encode(err.to_string()));
                self.flush();
                return Err(err);
            }
        };
        Ok(STANDARD.encode(json))
    }

    /// Restore an exported save, then write it under the save key. The
    /// export version is checked before anything else is decoded.
    pub fn import_save(&mut self, text: &str) -> Result<LoadOutcome, PersistenceError> {
        let imported = self.apply_import(text);
        self.flush();
        imported
    }

    fn apply_import(&mut self, text: &str) -> Result<LoadOutcome, PersistenceError> {
        let record = decode_export(text).map_err(|err| self.persistence_failed("import", err))?;
        let outcome = self.accept(record);
        if matches!(outcome, LoadOutcome::Loaded { .. }) {
            // Failures are reported through the bus.
            let _ = self.apply_save();
        }
        Ok(outcome)
    }

    fn record_at(&self, now: i64) -> SaveRecord {
        let mut state = self.state.clone();
        state.timestamps.last_save = Some(now);
        SaveRecord {
            state,
            config_version: self.config.version.clone(),
            timestamp: now,
        }
    }

    /// Version-gate a decoded record, then replace state and credit offline
    /// production.
    fn accept(&mut self, record: SaveRecord) -> LoadOutcome {
        if record.config_version != self.config.version {
            warn!(
                saved = %record.config_version,
                current = %self.config.version,
                "save rejected: config version mismatch"
            );
            self.emit(Event::VersionMismatch {
                saved_version: record.config_version.clone(),
                current_version: self.config.version.clone(),
            });
            return LoadOutcome::VersionMismatch {
                saved: record.config_version,
                current: self.config.version.clone(),
            };
        }

        let now = self.clock.now_ms();
        self.state = record.state.reconcile(&self.config);
        self.state.timestamps.last_update = now;

        let mut offline_seconds = 0.0;
        if self.config.offline_progress {
            let elapsed = elapsed_secs(record.timestamp, now);
            let seconds = elapsed.min(self.config.max_offline_time);
            if seconds > MIN_OFFLINE_SECONDS {
                self.produce(seconds);
                offline_seconds = seconds;
                info!(seconds, elapsed, "offline progress credited");
                self.emit(Event::OfflineProgress { seconds });
            }
        }

        self.settle(Pass::Unlocks);
        self.emit(Event::Load {
            timestamp: record.timestamp,
        });
        info!(saved_at = record.timestamp, "game loaded");
        LoadOutcome::Loaded { offline_seconds }
    }

    fn persistence_failed(&mut self, action: &str, err: PersistenceError) -> PersistenceError {
        self.report_error(format!("{action} failed: {err}"));
        err
    }
}

/// Base64 text to a save record, rejecting unknown export versions before
/// the state is decoded.
fn decode_export(text: &str) -> Result<SaveRecord, PersistenceError> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| PersistenceError::Base64(e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    let version = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| PersistenceError::Malformed("missing integer 'version'".into()))?;
    if version != u64::from(EXPORT_VERSION) {
        return Err(PersistenceError::UnsupportedExportVersion(version));
    }
    let export: ExportRecord =
        serde_json::from_value(value).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    Ok(export.record)
}
