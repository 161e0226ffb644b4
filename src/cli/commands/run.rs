//! Run command implementation.
//!
//! Wires the backend, catalog, assistant, ledgers and engine together and
//! reconciles the selected series one after another.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use colored::Colorize;
use tracing::info;

use super::{library_roots, open_assistant, open_backend};
use crate::cli::args::RunArgs;
use crate::core::classify::SkipRules;
use crate::core::discovery::{list_series_dirs, select_by_keyword};
use crate::core::engine::Reconciler;
use crate::core::ledger::{default_undo_path, load_done_series, ResumeLedger, UndoLedger};
use crate::core::ops::FsOps;
use crate::core::overlay::DryRunFs;
use crate::core::resolver::{IdentityCache, MetadataResolver};
use crate::core::runner::{BatchRunner, RunSummary};
use crate::generators::folder::is_valid_season_format;
use crate::models::config::{parse_csv_names, parse_csv_paths, Backend, Config};
use crate::services::tmdb::TmdbClient;
use crate::services::{ChatAssistant, RemoteFs};
use crate::utils::fs::norm_path;
use crate::{Error, Result};

/// Fold the command line flags into the configuration.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(roots) = &args.roots {
        config.library.roots = parse_csv_paths(roots);
    }
    if args.auto_roots || args.discover_only {
        config.library.auto_roots = true;
    }
    if let Some(pattern) = &args.discover_root_regex {
        config.library.root_regex = pattern.clone();
    }
    if let Some(categories) = &args.discover_categories {
        config.library.categories = parse_csv_names(categories);
    }
    if let Some(root) = &args.local_root {
        config.library.backend = Backend::Local;
        config.library.local_root = Some(root.clone());
    }
    if let Some(fmt) = &args.season_format {
        config.reconcile.season_format = fmt.clone();
    }
    if args.no_rename_series {
        config.reconcile.rename_series = false;
    }
    if args.no_rename_files {
        config.reconcile.rename_files = false;
    }
    if args.protect_tagged {
        config.reconcile.protect_tagged = true;
    }
    if args.no_fix_bare_tagged {
        config.reconcile.fix_bare_tagged = false;
    }
    if let Some(policy) = args.on_conflict {
        config.reconcile.on_conflict = policy;
    }
    if args.no_ai {
        config.ai.enabled = false;
    }
    if let Some(path) = &args.state_file {
        config.paths.state_file = path.clone();
    }
    if let Some(path) = &args.cache {
        config.paths.cache_file = path.clone();
    }
}

/// Reconcile the selected series. `stop` is polled between steps.
pub async fn run(config: &Config, args: &RunArgs, stop: Arc<AtomicBool>) -> Result<RunSummary> {
    if config.library.roots.is_empty() && !config.library.auto_roots {
        return Err(Error::NoLibraryRoots);
    }
    if !is_valid_season_format(&config.reconcile.season_format) {
        return Err(Error::InvalidConfig(format!(
            "unusable season format '{}'",
            config.reconcile.season_format
        )));
    }

    let backend = open_backend(config)?;
    let roots = library_roots(config, backend.as_ref()).await?;
    if roots.is_empty() {
        return Err(Error::NoLibraryRoots);
    }
    if args.discover_only {
        println!("{}", roots.join(","));
        return Ok(RunSummary {
            dry_run: args.dry_run,
            ..RunSummary::default()
        });
    }

    let overlay;
    let fs: &dyn RemoteFs = if args.dry_run {
        overlay = DryRunFs::new(backend.as_ref());
        &overlay
    } else {
        backend.as_ref()
    };

    let catalog = TmdbClient::new(&config.tmdb)?;
    let ai = open_assistant(config);
    let assistant = ai.as_ref().map(|a| a as &dyn ChatAssistant);

    let skip = SkipRules::new(config.reconcile.skip_dir_regex.as_deref())?;
    let series = if !args.paths.is_empty() {
        args.paths.iter().map(|p| norm_path(p)).collect()
    } else if let Some(keyword) = &args.keyword {
        select_by_keyword(fs, &roots, keyword, &skip, assistant).await?
    } else {
        list_series_dirs(fs, &roots, &skip, args.max_series).await?
    };

    print_header(config, args, &roots, series.len(), assistant.is_some());
    if series.is_empty() {
        println!("{}", "[INFO] Nothing to do".yellow());
        return Ok(RunSummary {
            dry_run: args.dry_run,
            ..RunSummary::default()
        });
    }

    let undo = if args.dry_run {
        None
    } else {
        let path = args
            .undo_log
            .clone()
            .unwrap_or_else(|| default_undo_path(&config.paths.log_dir));
        Some(UndoLedger::create(&path)?)
    };
    let ops = FsOps::new(fs, config.reconcile.on_conflict, args.dry_run, undo);

    let cache = IdentityCache::load(&config.paths.cache_file);
    info!("[TMDB] {} cached identities", cache.len());
    let resolver = MetadataResolver::new(&catalog, assistant, cache);
    let reconciler = Reconciler::new(&config.reconcile, &roots, ops, resolver, assistant, stop.clone())?;

    let (resume, done) = resume_state(config, args)?;

    let mut runner = BatchRunner::new(reconciler, resume, done, stop)
        .with_cache_file(config.paths.cache_file.clone());
    let summary = runner.run(&series).await;
    summary.print_summary();
    Ok(summary)
}

/// Ledger to append finished series to, and the series already finished.
/// Dry runs still skip finished series but never append.
fn resume_state(config: &Config, args: &RunArgs) -> Result<(Option<ResumeLedger>, HashSet<String>)> {
    let done = if args.no_resume {
        HashSet::new()
    } else {
        load_done_series(&config.paths.state_file)
    };
    let resume = if args.dry_run {
        None
    } else {
        Some(ResumeLedger::open(&config.paths.state_file)?)
    };
    Ok((resume, done))
}

fn print_header(config: &Config, args: &RunArgs, roots: &[String], series: usize, ai: bool) {
    if args.dry_run {
        println!("{}", "🔍 Dry run - no changes will be made".bold().yellow());
    } else {
        println!("{}", "🚀 Reconciling series folders".bold().cyan());
    }
    println!("  {} {}", "Roots:".bold(), roots.join(", "));
    println!("  {} {}", "Series:".bold(), series);
    println!("  {} {}", "Season format:".bold(), config.reconcile.season_format);
    println!("  {} {:?}", "On conflict:".bold(), config.reconcile.on_conflict);
    println!("  {} {}", "AI:".bold(), if ai { "on" } else { "off" });
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ConflictPolicy;
    use std::path::PathBuf;

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let args = RunArgs {
            roots: Some("/tv, /anime/".to_string()),
            local_root: Some(PathBuf::from("/mnt/library")),
            no_rename_files: true,
            on_conflict: Some(ConflictPolicy::Skip),
            no_ai: true,
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.library.roots, vec!["/tv", "/anime"]);
        assert_eq!(config.library.backend, Backend::Local);
        assert!(!config.reconcile.rename_files);
        assert!(config.reconcile.rename_series);
        assert_eq!(config.reconcile.on_conflict, ConflictPolicy::Skip);
        assert!(!config.ai.enabled);
        assert!(!config.library.auto_roots);

        let args = RunArgs {
            discover_only: true,
            discover_categories: Some("电视剧, 纪录片".to_string()),
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args);
        assert!(config.library.auto_roots);
        assert_eq!(config.library.categories, vec!["电视剧", "纪录片"]);
        assert_eq!(config.library.root_regex, "^OneDrive-");
    }

    #[test]
    fn test_resume_state_dry_run_keeps_done_series() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.state_file = tmp.path().join("state.jsonl");
        {
            let mut ledger = ResumeLedger::open(&config.paths.state_file).unwrap();
            ledger
                .append(&crate::models::ledger::SeriesOutcome::done("/tv/Alpha"))
                .unwrap();
        }

        let args = RunArgs {
            dry_run: true,
            ..RunArgs::default()
        };
        let (resume, done) = resume_state(&config, &args).unwrap();
        assert!(resume.is_none());
        assert!(done.contains("/tv/Alpha"));

        let args = RunArgs {
            dry_run: true,
            no_resume: true,
            ..RunArgs::default()
        };
        let (_, done) = resume_state(&config, &args).unwrap();
        assert!(done.is_empty());

        let (resume, done) = resume_state(&config, &RunArgs::default()).unwrap();
        assert!(resume.is_some());
        assert_eq!(done.len(), 1);
    }

    #[tokio::test]
    async fn test_discover_only_prints_roots_without_reconciling() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("OneDrive-a/电视剧/Show")).unwrap();
        std::fs::write(tmp.path().join("OneDrive-a/电视剧/Show/01.mp4"), b"x").unwrap();

        let mut config = Config::default();
        config.paths.roots_cache_file = tmp.path().join("state").join("roots_cache.json");
        config.paths.state_file = tmp.path().join("state").join("state.jsonl");
        let args = RunArgs {
            discover_only: true,
            local_root: Some(tmp.path().to_path_buf()),
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args);

        let summary = run(&config, &args, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(summary.attempted, 0);
        assert!(config.paths.roots_cache_file.is_file());
        assert!(tmp.path().join("OneDrive-a/电视剧/Show/01.mp4").is_file());
        assert!(!config.paths.state_file.exists());
    }

    #[tokio::test]
    async fn test_run_requires_roots() {
        let config = Config::default();
        let result = run(&config, &RunArgs::default(), Arc::new(AtomicBool::new(false))).await;
        assert!(matches!(result, Err(Error::NoLibraryRoots)));
    }
}
