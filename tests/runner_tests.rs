//! Batch runs: resume, stop, per-series failures and undo.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use common::{files, no_stop, reconciler, sorted, touch, tree, FakeCatalog};
use emby_reconciler::core::ledger::{load_done_series, read_undo_records, ResumeLedger, UndoLedger};
use emby_reconciler::core::overlay::DryRunFs;
use emby_reconciler::core::rollback::UndoExecutor;
use emby_reconciler::core::runner::BatchRunner;
use emby_reconciler::models::config::ReconcileConfig;
use emby_reconciler::models::ledger::SeriesOutcome;
use emby_reconciler::services::local::LocalFs;
use tempfile::TempDir;

fn two_shows(root: &std::path::Path) {
    touch(root, "tv/Alpha/01.mp4");
    touch(root, "tv/Bravo/Bravo.S01E01.mkv");
}

fn catalog() -> FakeCatalog {
    FakeCatalog::new(&[(1, "Alpha", "2019-01-01"), (2, "Bravo", "2021-06-01")])
}

fn series() -> Vec<String> {
    vec!["/tv/Alpha".to_string(), "/tv/Bravo".to_string()]
}

#[tokio::test]
async fn test_resume_skips_finished_series() {
    let tmp = TempDir::new().unwrap();
    two_shows(tmp.path());
    let state = tmp.path().join("logs").join("state.jsonl");

    let fs = LocalFs::new(tmp.path());
    let catalog = catalog();
    let settings = ReconcileConfig::default();

    let first = {
        let rec = reconciler(&fs, &catalog, &settings, None, false, None, no_stop());
        let resume = ResumeLedger::open(&state).unwrap();
        let mut runner = BatchRunner::new(rec, Some(resume), load_done_series(&state), no_stop());
        runner.run(&series()).await
    };
    assert_eq!(first.attempted, 2);
    assert_eq!(first.reconciled, 2);
    assert!(first.is_success());
    let searches = catalog.searches();

    let rec = reconciler(&fs, &catalog, &settings, None, false, None, no_stop());
    let resume = ResumeLedger::open(&state).unwrap();
    let mut runner = BatchRunner::new(rec, Some(resume), load_done_series(&state), no_stop());
    let second = runner.run(&series()).await;

    assert_eq!(second.resumed, 2);
    assert_eq!(second.attempted, 0);
    assert_eq!(catalog.searches(), searches);
}

#[tokio::test]
async fn test_dry_run_skips_finished_series() {
    let tmp = TempDir::new().unwrap();
    two_shows(tmp.path());
    let state = tmp.path().join("logs").join("state.jsonl");
    {
        let mut ledger = ResumeLedger::open(&state).unwrap();
        ledger.append(&SeriesOutcome::done("/tv/Alpha")).unwrap();
    }
    let state_before = std::fs::read_to_string(&state).unwrap();

    let backend = LocalFs::new(tmp.path());
    let overlay = DryRunFs::new(&backend);
    let catalog = catalog();
    let settings = ReconcileConfig::default();
    let rec = reconciler(&overlay, &catalog, &settings, None, true, None, no_stop());
    let mut runner = BatchRunner::new(rec, None, load_done_series(&state), no_stop());
    let summary = runner.run(&series()).await;

    assert!(summary.dry_run);
    assert_eq!(summary.resumed, 1);
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.reconciled, 1);
    // only Bravo is searched for
    assert_eq!(catalog.searches(), 1);
    assert_eq!(std::fs::read_to_string(&state).unwrap(), state_before);
    assert_eq!(
        files(&tmp.path().join("tv")),
        sorted(&["Alpha/01.mp4", "Bravo/Bravo.S01E01.mkv"])
    );
}

#[tokio::test]
async fn test_stop_before_start() {
    let tmp = TempDir::new().unwrap();
    two_shows(tmp.path());
    let before = files(&tmp.path().join("tv"));

    let fs = LocalFs::new(tmp.path());
    let catalog = catalog();
    let settings = ReconcileConfig::default();
    let stop = Arc::new(AtomicBool::new(true));
    let rec = reconciler(&fs, &catalog, &settings, None, false, None, stop.clone());
    let mut runner = BatchRunner::new(rec, None, Default::default(), stop);
    let summary = runner.run(&series()).await;

    assert!(summary.stopped);
    assert_eq!(summary.attempted, 0);
    assert_eq!(files(&tmp.path().join("tv")), before);
}

#[tokio::test]
async fn test_failed_series_does_not_abort_batch() {
    let tmp = TempDir::new().unwrap();
    two_shows(tmp.path());

    let fs = LocalFs::new(tmp.path());
    let catalog = catalog();
    let settings = ReconcileConfig::default();
    let rec = reconciler(&fs, &catalog, &settings, None, false, None, no_stop());
    let mut runner = BatchRunner::new(rec, None, Default::default(), no_stop());
    let summary = runner
        .run(&["/tv/Missing".to_string(), "/tv/Alpha".to_string()])
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.reconciled, 1);
    assert!(!summary.is_success());
    assert!(summary.errors[0].contains("/tv/Missing"));
}

#[tokio::test]
async fn test_undo_restores_original_files() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "tv/Show/Show.S01E01.mkv");
    touch(tmp.path(), "tv/Show/Season 2/第01集.mp4");
    let before = files(&tmp.path().join("tv"));
    let undo_path = tmp.path().join("logs").join("undo.jsonl");

    let fs = LocalFs::new(tmp.path());
    let catalog = FakeCatalog::new(&[(1, "Show", "2020-03-01")]);
    let settings = ReconcileConfig::default();
    let summary = {
        let ledger = UndoLedger::create(&undo_path).unwrap();
        let rec = reconciler(&fs, &catalog, &settings, None, false, Some(ledger), no_stop());
        let mut runner = BatchRunner::new(rec, None, Default::default(), no_stop());
        runner.run(&["/tv/Show".to_string()]).await
    };
    assert_eq!(summary.undo_file.as_deref(), Some(undo_path.as_path()));
    assert_eq!(
        files(&tmp.path().join("tv")),
        sorted(&[
            "Show (2020)/S01/Show (2020) - S01E01.mkv",
            "Show (2020)/S02/Show (2020) - S02E01.mp4",
        ])
    );

    let records = read_undo_records(&undo_path).unwrap();
    let result = UndoExecutor::new(&fs).quiet().execute(&records, false).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(files(&tmp.path().join("tv")), before);
    assert!(tree(&tmp.path().join("tv")).contains(&"Show/Season 2/".to_string()));
}
