//! Append-only history of the persisted PCR series.
//!
//! The core never depends on a specific file format: it talks to the
//! [`HistoryLog`] trait (`append` / `read_all`), and the flat-file
//! [`CsvHistory`] is one implementation of it. Entries accumulate
//! indefinitely; nothing ever removes one. Single-writer per process -
//! concurrent multi-process writers are out of scope.

use crate::error::DataError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// CSV header of the flat-file history store.
pub const HISTORY_HEADER: &str = "timestamp,pcr_top10";

/// One persisted PCR observation.
///
/// The timestamp is kept as the verbatim RFC 3339 string it was written
/// with, so a read-back returns it byte-identical.
#[derive(Clone, Debug, PartialEq, PartialOrd, Deserialize, Serialize, derive_more::Constructor)]
pub struct PcrEntry {
    pub timestamp: String,
    pub value: f64,
}

impl PcrEntry {
    /// Entry stamped with the current UTC wall clock.
    pub fn now(value: f64) -> Self {
        Self::new(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true), value)
    }
}

/// An ordered, append-only log of [`PcrEntry`] values.
///
/// Ordering is insertion order, which is chronological by construction.
pub trait HistoryLog: Send {
    fn append(&mut self, entry: &PcrEntry) -> Result<(), DataError>;
    fn read_all(&self) -> Result<Vec<PcrEntry>, DataError>;
}

/// Flat-file history store: a `timestamp,pcr_top10` header followed by one
/// `rfc3339,value` line per entry.
#[derive(Clone, Debug)]
pub struct CsvHistory {
    path: PathBuf,
}

impl CsvHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl HistoryLog for CsvHistory {
    fn append(&mut self, entry: &PcrEntry) -> Result<(), DataError> {
        let write_header = !self.path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if write_header {
            writeln!(file, "{HISTORY_HEADER}")?;
        }
        writeln!(file, "{},{}", entry.timestamp, entry.value)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<PcrEntry>, DataError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line == HISTORY_HEADER {
                continue;
            }
            let Some((timestamp, value)) = line.split_once(',') else {
                warn!(%line, "skipping malformed history line");
                continue;
            };
            let Ok(value) = value.trim().parse::<f64>() else {
                warn!(%line, "skipping history line with non-numeric value");
                continue;
            };
            entries.push(PcrEntry::new(timestamp.to_string(), value));
        }
        Ok(entries)
    }
}

/// In-memory history store, mainly for tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryHistory {
    entries: Vec<PcrEntry>,
}

impl HistoryLog for MemoryHistory {
    fn append(&mut self, entry: &PcrEntry) -> Result<(), DataError> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<PcrEntry>, DataError> {
        Ok(self.entries.clone())
    }
}
