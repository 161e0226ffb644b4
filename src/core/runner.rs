//! Batch runner: one series after another, with resume and a run summary.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use tracing::{error, info, warn};

use crate::core::engine::Reconciler;
use crate::core::ledger::ResumeLedger;
use crate::models::ledger::SeriesOutcome;
use crate::models::plan::{FolderOutcome, SeriesReport};
use crate::utils::fs::norm_path;

/// Totals for one batch.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub dry_run: bool,
    /// Series handed to the engine.
    pub attempted: usize,
    pub reconciled: usize,
    pub collections: usize,
    pub skipped: usize,
    /// Series already marked done in the resume ledger.
    pub resumed: usize,
    pub failed: usize,
    pub stopped: bool,
    pub mutations: usize,
    pub conflicts_skipped: usize,
    pub undo_file: Option<PathBuf>,
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn absorb(&mut self, report: &SeriesReport) {
        match report.outcome {
            FolderOutcome::Reconciled { .. } => self.reconciled += 1,
            FolderOutcome::Collection { .. } => self.collections += 1,
            FolderOutcome::Skipped { .. } => self.skipped += 1,
            FolderOutcome::Stopped { .. } => {}
        }
        self.mutations += report.mutation_count();
        self.conflicts_skipped += report.skipped().count();
    }

    pub fn print_summary(&self) {
        let title = if self.dry_run {
            "📊 Dry Run Summary"
        } else {
            "📊 Run Summary"
        };
        println!();
        println!("{}", title.bold().green());
        println!("  {} {}", "Attempted:".bold(), self.attempted);
        println!("  {} {}", "Reconciled:".bold(), self.reconciled);
        if self.collections > 0 {
            println!("  {} {}", "Collections:".bold(), self.collections);
        }
        println!("  {} {}", "Skipped:".bold(), self.skipped);
        if self.resumed > 0 {
            println!("  {} {}", "Already done:".bold(), self.resumed);
        }
        println!("  {} {}", "Failed:".bold(), self.failed);
        let verb = if self.dry_run { "Planned changes:" } else { "Changes:" };
        println!("  {} {}", verb.bold(), self.mutations);
        if self.conflicts_skipped > 0 {
            println!("  {} {}", "Skipped operations:".bold(), self.conflicts_skipped);
        }
        if let Some(undo) = &self.undo_file {
            println!("  {} {}", "Undo ledger:".bold(), undo.display());
        }
        if self.stopped {
            println!("{}", "⏹  Stopped on request".yellow());
        }
        if !self.errors.is_empty() {
            println!();
            println!("{}", "❌ Errors:".bold().red());
            for e in &self.errors {
                println!("  - {}", e);
            }
        }
    }
}

/// Drives the reconciler over a list of series folders.
pub struct BatchRunner<'a> {
    reconciler: Reconciler<'a>,
    resume: Option<ResumeLedger>,
    done: HashSet<String>,
    stop: Arc<AtomicBool>,
    cache_file: Option<PathBuf>,
}

impl<'a> BatchRunner<'a> {
    /// `resume` is the ledger outcomes are appended to (none in dry runs);
    /// `done` are the series it already marks complete.
    pub fn new(
        reconciler: Reconciler<'a>,
        resume: Option<ResumeLedger>,
        done: HashSet<String>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reconciler,
            resume,
            done,
            stop,
            cache_file: None,
        }
    }

    /// Persist the identity cache here once the batch ends.
    pub fn with_cache_file(mut self, path: PathBuf) -> Self {
        self.cache_file = Some(path);
        self
    }

    pub fn reconciler(&self) -> &Reconciler<'a> {
        &self.reconciler
    }

    fn record(&mut self, outcome: SeriesOutcome) {
        if let Some(ledger) = self.resume.as_mut() {
            if let Err(e) = ledger.append(&outcome) {
                warn!("[RESUME] cannot write {}: {}", ledger.path().display(), e);
            }
        }
    }

    /// Reconcile every series in order. Per-series failures never abort the batch.
    pub async fn run(&mut self, series: &[String]) -> RunSummary {
        let mut summary = RunSummary {
            dry_run: self.reconciler.ops().is_dry_run(),
            ..RunSummary::default()
        };

        for (idx, path) in series.iter().enumerate() {
            let path = norm_path(path);
            if self.stop.load(Ordering::SeqCst) {
                info!("[STOP] stop requested, {} series left", series.len() - idx);
                summary.stopped = true;
                break;
            }
            if self.done.contains(&path) {
                info!("[RESUME] already done: {}", path);
                summary.resumed += 1;
                continue;
            }

            info!("==> [{}/{}] {}", idx + 1, series.len(), path);
            summary.attempted += 1;
            match self.reconciler.reconcile_series(&path).await {
                Ok(report) if report.outcome.is_stopped() => {
                    summary.absorb(&report);
                    summary.stopped = true;
                    self.record(SeriesOutcome::error(&path, "stopped"));
                    break;
                }
                Ok(report) => {
                    summary.absorb(&report);
                    self.record(SeriesOutcome::done(&path));
                }
                Err(e) => {
                    error!("[ERROR] {}: {}", path, e);
                    summary.failed += 1;
                    summary.errors.push(format!("{}: {}", path, e));
                    self.record(SeriesOutcome::error(&path, e.to_string()));
                }
            }
        }

        if let Some(cache_file) = &self.cache_file {
            let cache = self.reconciler.resolver().cache();
            match cache.save(cache_file) {
                Ok(()) => info!("[TMDB] cached {} identities in {}", cache.len(), cache_file.display()),
                Err(e) => warn!("[TMDB] cannot save cache {}: {}", cache_file.display(), e),
            }
        }

        summary.undo_file = self
            .reconciler
            .ops()
            .undo_ledger()
            .filter(|ledger| ledger.written() > 0)
            .map(|ledger| ledger.path().to_path_buf());
        summary
    }
}
