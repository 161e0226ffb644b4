//! Append-only JSONL journals: the undo ledger and the resume ledger.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::ledger::{OperationRecord, OutcomeStatus, SeriesOutcome};
use crate::utils::fs::norm_path;
use crate::{Error, Result};

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn append_line<T: Serialize>(file: &mut File, value: &T) -> Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Read every parseable line; blank lines are ignored, malformed ones counted.
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    let mut malformed = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(value) => out.push(value),
            Err(e) => {
                debug!("skipping malformed ledger line in {}: {}", path.display(), e);
                malformed += 1;
            }
        }
    }
    Ok((out, malformed))
}

/// Default undo ledger location for a run started now.
pub fn default_undo_path(log_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    log_dir.join(format!("undo-{}.jsonl", stamp))
}

/// Undo ledger: one `OperationRecord` per applied mutation.
pub struct UndoLedger {
    path: PathBuf,
    file: File,
    written: usize,
}

impl UndoLedger {
    /// Open (or create) a ledger for appending.
    pub fn create(path: &Path) -> Result<Self> {
        let file = open_append(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn record(&mut self, record: &OperationRecord) -> Result<()> {
        append_line(&mut self.file, record)?;
        self.written += 1;
        Ok(())
    }
}

/// Load an undo ledger in file order. Malformed lines are skipped with a warning.
pub fn read_undo_records(path: &Path) -> Result<Vec<OperationRecord>> {
    if !path.exists() {
        return Err(Error::PathNotFound(path.display().to_string()));
    }
    let (records, malformed) = read_lines(path)?;
    if malformed > 0 {
        warn!("[UNDO] skipped {} malformed lines in {}", malformed, path.display());
    }
    if records.is_empty() && malformed > 0 {
        return Err(Error::InvalidUndoLedger(path.display().to_string()));
    }
    Ok(records)
}

/// Resume ledger: one `SeriesOutcome` per attempted series.
pub struct ResumeLedger {
    path: PathBuf,
    file: File,
}

impl ResumeLedger {
    pub fn open(path: &Path) -> Result<Self> {
        let file = open_append(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, outcome: &SeriesOutcome) -> Result<()> {
        append_line(&mut self.file, outcome)
    }
}

/// Series paths with a `done` record. A missing or unreadable ledger means nothing is done.
pub fn load_done_series(path: &Path) -> HashSet<String> {
    if !path.exists() {
        return HashSet::new();
    }
    match read_lines::<SeriesOutcome>(path) {
        Ok((outcomes, _)) => outcomes
            .into_iter()
            .filter(|o| o.status == OutcomeStatus::Done && !o.series_path.is_empty())
            .map(|o| norm_path(&o.series_path))
            .collect(),
        Err(e) => {
            warn!("[RESUME] cannot read {}: {}", path.display(), e);
            HashSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_ledger_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("undo.jsonl");
        {
            let mut ledger = UndoLedger::create(&path).unwrap();
            ledger.record(&OperationRecord::rename("/tv", "a", "b")).unwrap();
            ledger
                .record(&OperationRecord::moved("/tv/b", "/tv/b/S01", &["01.mp4".to_string()]))
                .unwrap();
            assert_eq!(ledger.written(), 2);
        }
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        let records = read_undo_records(&path).unwrap();
        assert!(matches!(&records[0], OperationRecord::RenamePath { new, .. } if new == "b"));
        assert!(matches!(&records[1], OperationRecord::Move { names, .. } if names.len() == 1));
    }

    #[test]
    fn test_undo_reader_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("undo.jsonl");
        fs::write(
            &path,
            "\n{\"op\":\"rename_path\",\"parent\":\"/tv\",\"old\":\"a\",\"new\":\"b\",\"ts\":\"t\"}\nnot json\n",
        )
        .unwrap();
        assert_eq!(read_undo_records(&path).unwrap().len(), 1);

        fs::write(&path, "garbage\n").unwrap();
        assert!(matches!(read_undo_records(&path), Err(Error::InvalidUndoLedger(_))));
        assert!(matches!(
            read_undo_records(&dir.path().join("missing.jsonl")),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn test_resume_ledger_done_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.jsonl");
        {
            let mut ledger = ResumeLedger::open(&path).unwrap();
            ledger.append(&SeriesOutcome::done("/tv/A/")).unwrap();
            ledger.append(&SeriesOutcome::error("/tv/B", "boom")).unwrap();
        }
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{broken\n")
            .unwrap();

        let done = load_done_series(&path);
        assert!(done.contains("/tv/A"));
        assert!(!done.contains("/tv/B"));
        assert!(load_done_series(&dir.path().join("none.jsonl")).is_empty());
    }
}
