//! Decision trace and reconciliation outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One decision taken while reconciling, in execution order.
///
/// A dry run produces the same sequence of actions as a real run over the same tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Action {
    /// A directory was created.
    Mkdir { path: String },
    /// `from` (full path) was renamed to `to` (full path).
    Rename { from: String, to: String },
    /// `name` was moved from `src_dir` into `dst_dir`.
    Move {
        src_dir: String,
        dst_dir: String,
        name: String,
    },
    /// Junk entries were removed from `dir`.
    Remove { dir: String, names: Vec<String> },
    /// An operation was abandoned.
    Skip { path: String, reason: String },
}

impl Action {
    /// Whether this action changes the tree.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::Skip { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Mkdir { path } => write!(f, "mkdir {}", path),
            Action::Rename { from, to } => write!(f, "rename {} -> {}", from, to),
            Action::Move {
                src_dir,
                dst_dir,
                name,
            } => write!(f, "move [{}] : {} -> {}", name, src_dir, dst_dir),
            Action::Remove { dir, names } => write!(f, "remove {:?} in {}", names, dir),
            Action::Skip { path, reason } => write!(f, "skip {} ({})", path, reason),
        }
    }
}

/// Why a folder was not reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Nesting exceeded the configured depth.
    TooDeep(usize),
    /// No acceptable catalog match.
    NotFound,
    /// Nothing inside.
    Empty,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooDeep(depth) => write!(f, "too deep ({})", depth),
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::Empty => write!(f, "empty"),
        }
    }
}

/// Result of reconciling one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    /// Reconciled as a single show; `path` is its final location.
    Reconciled { path: String },
    /// Treated as a collection container; its children were reconciled individually.
    Collection { path: String },
    /// Left untouched.
    Skipped { path: String, reason: SkipReason },
    /// The stop signal was observed; work is partial.
    Stopped { path: String },
}

impl FolderOutcome {
    /// The folder's path after processing.
    pub fn path(&self) -> &str {
        match self {
            FolderOutcome::Reconciled { path }
            | FolderOutcome::Collection { path }
            | FolderOutcome::Skipped { path, .. }
            | FolderOutcome::Stopped { path } => path,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, FolderOutcome::Stopped { .. })
    }
}

/// Everything that happened while reconciling one series folder.
#[derive(Debug, Clone)]
pub struct SeriesReport {
    pub series_path: String,
    pub outcome: FolderOutcome,
    pub actions: Vec<Action>,
}

impl SeriesReport {
    /// Number of renames and moves (the operations the undo ledger tracks).
    pub fn rename_move_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Rename { .. } | Action::Move { .. }))
            .count()
    }

    /// Number of tree mutations of any kind.
    pub fn mutation_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_mutation()).count()
    }

    /// Abandoned operations.
    pub fn skipped(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Skip { .. }))
    }
}
