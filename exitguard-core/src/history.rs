//! Closed-position history: an in-memory append-only log plus an optional JSON
//! array file.
//!
//! The file is a single JSON array capped at `max_history_entries` (oldest
//! dropped). `HistoryLog` loads it once, then every append rewrites the whole
//! in-memory log through a temp file + rename under the log's mutex, so
//! concurrent closes never interleave. A file that fails to parse at load is
//! moved aside to `<name>.corrupt` and the log starts empty.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ExitReason, MarketRegime, Position, Side, StrategyType};
use crate::error::PersistenceError;
use crate::partial_exit::PartialExit;

/// Immutable snapshot of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPositionRecord {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub strategy_type: StrategyType,
    pub market_regime: MarketRegime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub quantity: f64,
    pub profit_pct: f64,
    pub max_profit_pct: f64,
    pub efficiency: f64,
    pub exit_reason: ExitReason,
    #[serde(default)]
    pub partial_exits: Vec<PartialExit>,
}

impl ClosedPositionRecord {
    /// `None` unless the position is closed.
    pub fn from_position(position: &Position) -> Option<Self> {
        let exit = position.exit()?;
        Some(Self {
            id: position.id.to_string(),
            symbol: position.symbol.clone(),
            side: position.side,
            strategy_type: position.strategy_type,
            market_regime: position.market_regime,
            entry_price: position.entry_price,
            exit_price: exit.exit_price,
            entry_time: position.entry_time,
            exit_time: exit.exit_time,
            quantity: position.quantity,
            profit_pct: exit.profit_pct,
            max_profit_pct: exit.max_profit_pct,
            efficiency: exit.efficiency,
            exit_reason: exit.exit_reason,
            partial_exits: position.partial_exits().to_vec(),
        })
    }

    pub fn had_partial_exits(&self) -> bool {
        !self.partial_exits.is_empty()
    }
}

/// JSON-array history file.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<ClosedPositionRecord>, PersistenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_err(source)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|source| PersistenceError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Read, append, drop the oldest beyond `max_entries`, rewrite.
    pub fn append(
        &self,
        record: &ClosedPositionRecord,
        max_entries: usize,
    ) -> Result<(), PersistenceError> {
        let mut records = self.load()?;
        records.push(record.clone());
        if records.len() > max_entries {
            let excess = records.len() - max_entries;
            records.drain(..excess);
        }
        self.write_all(&records)
    }

    /// Replace the file with `records` (temp file + rename).
    pub fn write_all(&self, records: &[ClosedPositionRecord]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let json = serde_json::to_string_pretty(records).map_err(|source| PersistenceError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// Rename the file to `<name>.corrupt`, replacing any earlier one.
    pub fn quarantine(&self) -> Result<PathBuf, PersistenceError> {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        let target = PathBuf::from(name);
        fs::rename(&self.path, &target).map_err(|e| self.io_err(e))?;
        Ok(target)
    }

    fn io_err(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Append-only history owned by the lifecycle manager.
#[derive(Debug)]
pub struct HistoryLog {
    records: Mutex<VecDeque<ClosedPositionRecord>>,
    store: Option<JsonHistoryStore>,
    max_entries: usize,
}

impl HistoryLog {
    /// In-memory only.
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            store: None,
            max_entries: max_entries.max(1),
        }
    }

    /// Backed by a JSON file; existing records are loaded into memory.
    ///
    /// A file that is not a valid history array is moved aside to
    /// `<name>.corrupt` and the log starts empty; the next append writes a
    /// fresh file from memory. Other read failures are logged only.
    pub fn with_store(store: JsonHistoryStore, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        let existing = match store.load() {
            Ok(records) => records,
            Err(err @ PersistenceError::Json { .. }) => {
                match store.quarantine() {
                    Ok(moved) => warn!(
                        path = %store.path().display(),
                        moved_to = %moved.display(),
                        error = %err,
                        "corrupt history moved aside"
                    ),
                    Err(mv) => warn!(
                        path = %store.path().display(),
                        error = %err,
                        rename_error = %mv,
                        "corrupt history could not be moved aside"
                    ),
                }
                Vec::new()
            }
            Err(err) => {
                warn!(path = %store.path().display(), error = %err, "could not load history");
                Vec::new()
            }
        };
        let mut records: VecDeque<_> = existing.into();
        while records.len() > max_entries {
            records.pop_front();
        }
        Self {
            records: Mutex::new(records),
            store: Some(store),
            max_entries,
        }
    }

    /// Append in memory, then rewrite the file from the in-memory log. The
    /// in-memory append always happens.
    pub fn append(&self, record: ClosedPositionRecord) -> Result<(), PersistenceError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.push_back(record);
        while records.len() > self.max_entries {
            records.pop_front();
        }
        match &self.store {
            Some(store) => store.write_all(records.make_contiguous()),
            None => Ok(()),
        }
    }

    /// Snapshot of the in-memory log, oldest first.
    pub fn records(&self) -> Vec<ClosedPositionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn store(&self) -> Option<&JsonHistoryStore> {
        self.store.as_ref()
    }
}
