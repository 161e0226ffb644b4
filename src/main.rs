//! Emby Reconciler CLI
//!
//! Reshapes loosely organized TV folders on AList into the
//! `Series (Year)/S01/Series (Year) - S01E01.ext` layout Emby expects.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use emby_reconciler::cli::{
    args::{Cli, Commands},
    commands::{check, parse, run, search, undo},
};
use emby_reconciler::models::config::{load_config, Config};
use emby_reconciler::preflight;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    config.apply_env()?;
    if let Commands::Run(args) = &cli.command {
        run::apply_overrides(&mut config, args);
    }

    // Only the commands that change the library log to a file by default.
    let log_file = match &cli.command {
        Commands::Run(_) | Commands::Undo { .. } => Some(
            cli.log_file
                .clone()
                .unwrap_or_else(|| default_log_file(&config)),
        ),
        _ => cli.log_file.clone(),
    };
    init_logging(cli.verbose, log_file);

    match cli.command {
        Commands::Run(args) => {
            if !cli.skip_preflight && !args.discover_only {
                run_preflight_checks(&config).await?;
            }

            let stop = Arc::new(AtomicBool::new(false));
            watch_ctrl_c(stop.clone());

            let summary = run::run(&config, &args, stop).await?;
            if !summary.is_success() {
                anyhow::bail!("{} series failed", summary.failed);
            }
        }

        Commands::Undo {
            undo_file,
            yes,
            dry_run,
        } => {
            let result = undo::undo(&config, &undo_file, yes, dry_run).await?;
            if !result.is_success() {
                anyhow::bail!("{} undo operations failed", result.error_count);
            }
        }

        Commands::Parse { names } => {
            parse::parse_names(&names);
        }

        Commands::Search { keyword } => {
            search::search(&config, &keyword).await?;
        }

        Commands::Check => {
            if !check::check(&config).await {
                anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
            }
        }
    }

    Ok(())
}

fn default_log_file(config: &Config) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    config
        .paths
        .log_dir
        .join(format!("emby-reconciler-{}.log", stamp))
}

/// Initialize the logging system.
fn init_logging(verbose: bool, log_file: Option<PathBuf>) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("emby_reconciler=debug")
    } else {
        EnvFilter::new("emby_reconciler=info")
    };

    // A log file that cannot be opened never blocks the run.
    let file = log_file.and_then(|path| {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("[WARN] cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::sync::Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(file_layer)
        .with(filter)
        .init();
}

/// Flip `stop` on Ctrl-C; the engine finishes its current step and stops.
fn watch_ctrl_c(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("[STOP] Ctrl-C received, stopping after the current step");
            stop.store(true, Ordering::SeqCst);
        }
    });
}

/// Run preflight checks and exit if any fail.
async fn run_preflight_checks(config: &Config) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config).await;
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
