//! Undo command implementation.
//!
//! Reads an undo ledger and reverses its operations to restore the tree
//! as it was before the run.

use std::path::Path;

use colored::Colorize;

use super::open_backend;
use crate::core::ledger::read_undo_records;
use crate::core::rollback::{UndoExecutor, UndoResult};
use crate::models::config::Config;
use crate::{Error, Result};

/// Replay `undo_file` in reverse. Without `yes` only a dry run is allowed.
pub async fn undo(config: &Config, undo_file: &Path, yes: bool, dry_run: bool) -> Result<UndoResult> {
    if !yes && !dry_run {
        return Err(Error::UndoNotConfirmed);
    }

    println!("{}", "[UNDO] Undo command".bold().cyan());
    println!();

    println!("[INFO] Loading undo ledger: {}", undo_file.display());
    let records = read_undo_records(undo_file)?;
    println!("  {} {}", "Operations:".bold(), records.len());
    println!();

    if !dry_run {
        println!(
            "{}",
            "[WARNING] This will reverse every recorded rename and move!"
                .bold()
                .yellow()
        );
        println!();
    }

    let backend = open_backend(config)?;
    let result = UndoExecutor::new(backend.as_ref())
        .execute(&records, dry_run)
        .await;

    println!();
    result.print_summary();
    println!();

    if !result.is_success() {
        println!("{}", "[WARNING] Undo completed with errors".yellow());
    } else if dry_run {
        println!("{}", "[OK] Dry run complete - no changes were made".green());
        println!();
        println!("{}", "[Next Steps]".bold().cyan());
        println!("  To actually undo:");
        println!(
            "     {}",
            format!("emby-reconciler undo {} --yes", undo_file.display()).bold()
        );
    } else {
        println!("{}", "[OK] Undo completed successfully!".green());
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refuses_without_confirmation() {
        let config = Config::default();
        let result = undo(&config, Path::new("/nonexistent/undo.jsonl"), false, false).await;
        assert!(matches!(result, Err(Error::UndoNotConfirmed)));
    }

    #[tokio::test]
    async fn test_missing_ledger() {
        let config = Config::default();
        let result = undo(&config, Path::new("/nonexistent/undo.jsonl"), false, true).await;
        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }
}
