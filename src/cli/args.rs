//! Command line argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::models::config::ConflictPolicy;

/// Emby Reconciler - Reshape AList TV folders into an Emby-friendly layout
#[derive(Parser, Debug)]
#[command(name = "emby-reconciler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: <config dir>/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the log to this file as well
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile series folders under the library roots
    Run(RunArgs),

    /// Replay an undo ledger in reverse
    Undo {
        /// Path to the undo-*.jsonl file
        #[arg(value_name = "UNDO_FILE")]
        undo_file: PathBuf,

        /// Confirm that the recorded changes should be reverted
        #[arg(long)]
        yes: bool,

        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how names are parsed (debugging aid)
    Parse {
        /// File or folder names
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Show which series folders a keyword selects
    Search {
        /// Folder keyword or absolute path
        #[arg(value_name = "KEYWORD")]
        keyword: String,
    },

    /// Run preflight checks only
    Check,
}

/// Options of the `run` command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Series folders to process (default: every folder under the roots)
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,

    /// Dry run - decide everything, change nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Only process the folder matching this keyword
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Stop after this many series
    #[arg(long, value_name = "N")]
    pub max_series: Option<usize>,

    /// Comma-separated library roots (overrides TV_ROOTS)
    #[arg(long, value_name = "CSV")]
    pub roots: Option<String>,

    /// Discover library roots from the storages when none are configured
    #[arg(long)]
    pub auto_roots: bool,

    /// Print the discovered library roots and exit
    #[arg(long)]
    pub discover_only: bool,

    /// Storage name pattern for root discovery (default: ^OneDrive-)
    #[arg(long, value_name = "REGEX")]
    pub discover_root_regex: Option<String>,

    /// Comma-separated category folders for root discovery (default: 电视剧,动漫)
    #[arg(long, value_name = "CSV")]
    pub discover_categories: Option<String>,

    /// Season folder format, e.g. "S{season:02}" or "Season {season}"
    #[arg(long, value_name = "FORMAT")]
    pub season_format: Option<String>,

    /// Keep series folder names
    #[arg(long)]
    pub no_rename_series: bool,

    /// Keep episode file names
    #[arg(long)]
    pub no_rename_files: bool,

    /// Never rename files that already carry SxxEyy
    #[arg(long)]
    pub protect_tagged: bool,

    /// Do not prefix the series name onto bare SxxEyy names
    #[arg(long)]
    pub no_fix_bare_tagged: bool,

    /// What to do when a target name is taken
    #[arg(long, value_name = "POLICY")]
    pub on_conflict: Option<ConflictPolicy>,

    /// Disable the AI assistant
    #[arg(long)]
    pub no_ai: bool,

    /// Ignore the resume ledger and process every series
    #[arg(long)]
    pub no_resume: bool,

    /// Resume ledger location
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Undo ledger location (default: <log dir>/undo-<timestamp>.jsonl)
    #[arg(long, value_name = "FILE")]
    pub undo_log: Option<PathBuf>,

    /// Identity cache location
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Operate on a local directory instead of AList
    #[arg(long, value_name = "DIR")]
    pub local_root: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "emby-reconciler",
            "-v",
            "run",
            "--dry-run",
            "--roots",
            "/tv,/anime",
            "--on-conflict",
            "skip",
            "/tv/Show",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        assert_eq!(args.on_conflict, Some(ConflictPolicy::Skip));
        assert_eq!(args.paths, vec!["/tv/Show"]);
    }

    #[test]
    fn test_parse_discovery_flags() {
        let cli = Cli::try_parse_from([
            "emby-reconciler",
            "run",
            "--discover-only",
            "--discover-root-regex",
            "^Drive",
            "--discover-categories",
            "电视剧,纪录片",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.discover_only);
        assert!(!args.auto_roots);
        assert_eq!(args.discover_root_regex.as_deref(), Some("^Drive"));
        assert_eq!(args.discover_categories.as_deref(), Some("电视剧,纪录片"));
    }

    #[test]
    fn test_parse_undo() {
        let cli = Cli::try_parse_from(["emby-reconciler", "undo", "undo.jsonl", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Undo { yes: true, dry_run: false, .. }));
    }
}
