//! Undo and resume ledger records.

use serde::{Deserialize, Serialize};

/// Timestamp format shared by both ledgers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in ledger format.
pub fn now_ts() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One applied, reversible filesystem mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum OperationRecord {
    /// `parent/old` was renamed to `parent/new`.
    #[serde(rename = "rename_path")]
    RenamePath {
        parent: String,
        old: String,
        new: String,
        ts: String,
    },
    /// `names` were moved from `src_dir` into `dst_dir`.
    #[serde(rename = "move")]
    Move {
        src_dir: String,
        dst_dir: String,
        names: Vec<String>,
        ts: String,
    },
}

impl OperationRecord {
    /// Record a rename stamped with the current time.
    pub fn rename(parent: &str, old: &str, new: &str) -> Self {
        Self::RenamePath {
            parent: parent.to_string(),
            old: old.to_string(),
            new: new.to_string(),
            ts: now_ts(),
        }
    }

    /// Record a move stamped with the current time.
    pub fn moved(src_dir: &str, dst_dir: &str, names: &[String]) -> Self {
        Self::Move {
            src_dir: src_dir.to_string(),
            dst_dir: dst_dir.to_string(),
            names: names.to_vec(),
            ts: now_ts(),
        }
    }
}

/// Final status of one series attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Done,
    Error,
}

/// Completion marker for one series folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOutcome {
    pub series_path: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ts: String,
}

impl SeriesOutcome {
    /// A successful outcome.
    pub fn done(series_path: &str) -> Self {
        Self {
            series_path: series_path.to_string(),
            status: OutcomeStatus::Done,
            error: None,
            ts: now_ts(),
        }
    }

    /// A failed outcome carrying the error text.
    pub fn error(series_path: &str, error: impl Into<String>) -> Self {
        Self {
            series_path: series_path.to_string(),
            status: OutcomeStatus::Error,
            error: Some(error.into()),
            ts: now_ts(),
        }
    }
}
