//! Undo replay.
//!
//! Walks an undo ledger backwards and inverts each record:
//! - renames go back from `new` to `old`
//! - moves go back from `dst_dir` to `src_dir`
//!
//! Every record is attempted; failures are collected, never fatal.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use crate::models::ledger::OperationRecord;
use crate::services::RemoteFs;
use crate::utils::fs::join_path;
use crate::{Error, Result};

/// What replaying one record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replayed {
    Applied,
    /// Nothing left to undo (already restored or gone).
    Skipped,
}

/// Replays undo ledgers against a filesystem.
pub struct UndoExecutor<'a> {
    fs: &'a dyn RemoteFs,
    show_progress: bool,
}

impl<'a> UndoExecutor<'a> {
    pub fn new(fs: &'a dyn RemoteFs) -> Self {
        Self {
            fs,
            show_progress: true,
        }
    }

    /// Disable the progress bar (tests, piped output).
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Invert `records` in reverse order.
    pub async fn execute(&self, records: &[OperationRecord], dry_run: bool) -> UndoResult {
        if self.show_progress {
            if dry_run {
                println!("{}", "🔍 Dry run - no changes will be made".bold().yellow());
            } else {
                println!("{}", "⏪ Replaying undo ledger...".bold().cyan());
            }
            println!();
        }

        let mut result = UndoResult::default();
        let pb = if self.show_progress {
            let pb = ProgressBar::new(records.len() as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("█▓░"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        for record in records.iter().rev() {
            pb.set_message(describe(record));
            pb.inc(1);

            if dry_run {
                pb.println(format!("  {} {}", "[DRY]".yellow(), describe(record)));
                result.success_count += 1;
                continue;
            }

            match self.replay(record).await {
                Ok(Replayed::Applied) => result.success_count += 1,
                Ok(Replayed::Skipped) => result.skip_count += 1,
                Err(e) => {
                    let msg = format!("{}: {}", describe(record), e);
                    error!("[UNDO] failed: {}", msg);
                    result.errors.push(msg);
                    result.error_count += 1;
                }
            }
        }

        pb.finish_with_message("Done!");
        result
    }

    async fn replay(&self, record: &OperationRecord) -> Result<Replayed> {
        match record {
            OperationRecord::RenamePath { parent, old, new, .. } => {
                let entries = self.fs.list(parent).await?;
                if !entries.iter().any(|e| &e.name == new) {
                    warn!("[UNDO] {} no longer exists, skipping", join_path(parent, new));
                    return Ok(Replayed::Skipped);
                }
                if entries.iter().any(|e| &e.name == old) {
                    return Err(Error::other(format!(
                        "original location occupied: {}",
                        join_path(parent, old)
                    )));
                }
                self.fs.rename(&join_path(parent, new), old).await?;
                debug!("[UNDO] renamed back {} -> {}", new, old);
                Ok(Replayed::Applied)
            }
            OperationRecord::Move {
                src_dir,
                dst_dir,
                names,
                ..
            } => {
                let moved = self.fs.list(dst_dir).await?;
                let origin = self.fs.list(src_dir).await?;
                let mut back = Vec::new();
                for name in names {
                    if !moved.iter().any(|e| &e.name == name) {
                        warn!("[UNDO] {} no longer exists, skipping", join_path(dst_dir, name));
                    } else if origin.iter().any(|e| &e.name == name) {
                        return Err(Error::other(format!(
                            "original location occupied: {}",
                            join_path(src_dir, name)
                        )));
                    } else {
                        back.push(name.clone());
                    }
                }
                if back.is_empty() {
                    return Ok(Replayed::Skipped);
                }
                self.fs.move_entries(dst_dir, src_dir, &back).await?;
                debug!("[UNDO] moved back {:?} -> {}", back, src_dir);
                Ok(Replayed::Applied)
            }
        }
    }
}

/// Human-readable inverse of a record.
fn describe(record: &OperationRecord) -> String {
    match record {
        OperationRecord::RenamePath { parent, old, new, .. } => {
            format!("rename {} -> {}", join_path(parent, new), old)
        }
        OperationRecord::Move {
            src_dir,
            dst_dir,
            names,
            ..
        } => format!("move {:?}: {} -> {}", names, dst_dir, src_dir),
    }
}

/// Result of an undo replay.
#[derive(Debug, Default)]
pub struct UndoResult {
    /// Number of records inverted.
    pub success_count: usize,
    /// Number of records with nothing left to undo.
    pub skip_count: usize,
    /// Number of failed records.
    pub error_count: usize,
    /// Error messages.
    pub errors: Vec<String>,
}

impl UndoResult {
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }

    pub fn print_summary(&self) {
        println!("{}", "📊 Undo Summary".bold().green());
        println!("  {} {}", "Restored:".bold(), self.success_count);
        println!("  {} {}", "Skipped:".bold(), self.skip_count);
        println!("  {} {}", "Failed:".bold(), self.error_count);

        if !self.errors.is_empty() {
            println!();
            println!("{}", "❌ Errors:".bold().red());
            for error in &self.errors {
                println!("  - {}", error);
            }
        }
    }
}
