//! Conflict-safe filesystem operations.
//!
//! Every mutation the engine performs goes through [`FsOps`]: destination
//! names are checked against fresh listings, conflicts are resolved per the
//! configured policy, each decision is appended to the action trace, and
//! applied renames and moves are journaled to the undo ledger.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::core::ledger::UndoLedger;
use crate::generators::filename::{numbered_name, safe_filename};
use crate::models::config::ConflictPolicy;
use crate::models::ledger::OperationRecord;
use crate::models::media::DirEntry;
use crate::models::plan::Action;
use crate::services::{RemoteFs, RemoveOutcome};
use crate::utils::fs::{join_path, norm_path, split_path};
use crate::Result;

/// Highest ` (n)` suffix tried before giving up on a name.
const MAX_SUFFIX: u32 = 200;

pub struct FsOps<'a> {
    fs: &'a dyn RemoteFs,
    policy: ConflictPolicy,
    dry_run: bool,
    undo: Option<UndoLedger>,
    trace: Vec<Action>,
}

impl<'a> FsOps<'a> {
    /// `fs` must already be the dry-run overlay when `dry_run` is set.
    pub fn new(fs: &'a dyn RemoteFs, policy: ConflictPolicy, dry_run: bool, undo: Option<UndoLedger>) -> Self {
        Self {
            fs,
            policy,
            dry_run,
            undo: if dry_run { None } else { undo },
            trace: Vec::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn undo_ledger(&self) -> Option<&UndoLedger> {
        self.undo.as_ref()
    }

    /// Drain the actions recorded so far.
    pub fn take_trace(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.trace)
    }

    /// Children of `dir`, sorted by name.
    pub async fn list(&self, dir: &str) -> Result<Vec<DirEntry>> {
        let mut entries = self.fs.list(dir).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn prefix(&self) -> &'static str {
        if self.dry_run {
            "[DRY] "
        } else {
            ""
        }
    }

    fn note(&mut self, action: Action) {
        let dry = self.prefix();
        match &action {
            Action::Mkdir { path } => info!("{}[MKDIR] {}", dry, path),
            Action::Rename { from, to } => info!("{}[RENAME] {} -> {}", dry, from, to),
            Action::Move {
                src_dir,
                dst_dir,
                name,
            } => info!("{}[MOVE] {}: {} -> {}", dry, name, src_dir, dst_dir),
            Action::Remove { dir, names } => info!("{}[CLEAN] {}: {:?}", dry, dir, names),
            Action::Skip { path, reason } => warn!("{}[SKIP] {} ({})", dry, path, reason),
        }
        self.trace.push(action);
    }

    fn journal(&mut self, record: OperationRecord) -> Result<()> {
        if let Some(ledger) = self.undo.as_mut() {
            ledger.record(&record)?;
        }
        Ok(())
    }

    /// Record an abandoned operation.
    pub fn skip(&mut self, path: &str, reason: impl Into<String>) {
        self.note(Action::Skip {
            path: path.to_string(),
            reason: reason.into(),
        });
    }

    /// First acceptable name for `desired` given the `taken` predicate.
    fn free_name(&self, desired: &str, is_dir: bool, taken: impl Fn(&str) -> bool) -> Option<String> {
        if !taken(desired) {
            return Some(desired.to_string());
        }
        if self.policy == ConflictPolicy::Skip {
            return None;
        }
        (1..=MAX_SUFFIX)
            .map(|n| numbered_name(desired, n, is_dir))
            .find(|candidate| !taken(candidate))
    }

    /// Create `parent/name` unless a directory of that name exists. Returns its path.
    pub async fn ensure_dir(&mut self, parent: &str, name: &str) -> Result<String> {
        let name = safe_filename(name);
        let target = join_path(parent, &name);
        let entries = self.list(parent).await?;
        if entries.iter().any(|e| e.is_dir && e.name == name) {
            return Ok(target);
        }
        self.fs.mkdir(&target).await?;
        self.note(Action::Mkdir {
            path: target.clone(),
        });
        Ok(target)
    }

    /// Rename the item at `path` to `new_name` within its parent.
    ///
    /// The item's own current name never counts as a conflict. Returns the
    /// item's path afterwards (unchanged when skipped or already in place).
    pub async fn rename(&mut self, path: &str, new_name: &str) -> Result<String> {
        let path = norm_path(path);
        let (parent, old) = split_path(&path);
        let desired = safe_filename(new_name);
        if old.is_empty() || desired.is_empty() || old == desired {
            return Ok(path);
        }

        let entries = self.list(&parent).await?;
        let is_dir = entries.iter().any(|e| e.name == old && e.is_dir);
        let taken: HashSet<&str> = entries
            .iter()
            .map(|e| e.name.as_str())
            .filter(|n| *n != old)
            .collect();

        let Some(final_name) = self.free_name(&desired, is_dir, |n| taken.contains(n)) else {
            self.skip(&path, format!("rename target exists: {}", desired));
            return Ok(path);
        };
        if final_name == old {
            return Ok(path);
        }
        if final_name != desired {
            info!("{}[RENAME] {} taken, using {}", self.prefix(), desired, final_name);
        }

        self.fs.rename(&path, &final_name).await?;
        let new_path = join_path(&parent, &final_name);
        self.note(Action::Rename {
            from: path.clone(),
            to: new_path.clone(),
        });
        self.journal(OperationRecord::rename(&parent, &old, &final_name))?;
        Ok(new_path)
    }

    /// Move `name` from `src_dir` into `dst_dir`.
    ///
    /// When `dst_dir` already holds that name the source is first renamed to a
    /// name free in both directories. Returns the name the item ends up with,
    /// or `None` when the move was abandoned.
    pub async fn move_into(&mut self, src_dir: &str, dst_dir: &str, name: &str) -> Result<Option<String>> {
        let src_dir = norm_path(src_dir);
        let dst_dir = norm_path(dst_dir);
        if src_dir == dst_dir {
            return Ok(Some(name.to_string()));
        }

        let dst_entries = self.list(&dst_dir).await?;
        let mut final_name = name.to_string();
        if dst_entries.iter().any(|e| e.name == name) {
            let src_entries = self.list(&src_dir).await?;
            let is_dir = src_entries.iter().any(|e| e.name == name && e.is_dir);
            let taken = |n: &str| {
                dst_entries.iter().any(|e| e.name == n) || src_entries.iter().any(|e| e.name == n)
            };
            let Some(free) = self.free_name(name, is_dir, taken) else {
                self.skip(
                    &join_path(&src_dir, name),
                    format!("move target exists in {}", dst_dir),
                );
                return Ok(None);
            };

            let src_path = join_path(&src_dir, name);
            self.fs.rename(&src_path, &free).await?;
            self.note(Action::Rename {
                from: src_path,
                to: join_path(&src_dir, &free),
            });
            self.journal(OperationRecord::rename(&src_dir, name, &free))?;
            final_name = free;
        }

        let names = vec![final_name.clone()];
        self.fs.move_entries(&src_dir, &dst_dir, &names).await?;
        self.note(Action::Move {
            src_dir: src_dir.clone(),
            dst_dir: dst_dir.clone(),
            name: final_name.clone(),
        });
        self.journal(OperationRecord::moved(&src_dir, &dst_dir, &names))?;
        Ok(Some(final_name))
    }

    /// Move the folder at `path` into `dst_dir`. Returns its path afterwards.
    pub async fn move_folder_to(&mut self, path: &str, dst_dir: &str) -> Result<String> {
        let (parent, name) = split_path(path);
        Ok(match self.move_into(&parent, dst_dir, &name).await? {
            Some(final_name) => join_path(dst_dir, &final_name),
            None => norm_path(path),
        })
    }

    /// Best-effort removal. Failures and unsupported backends are logged, never raised.
    pub async fn remove(&mut self, dir: &str, names: Vec<String>) -> bool {
        if names.is_empty() {
            return true;
        }
        match self.fs.remove(dir, &names).await {
            RemoveOutcome::Removed => {
                self.note(Action::Remove {
                    dir: norm_path(dir),
                    names,
                });
                true
            }
            RemoveOutcome::Unsupported => {
                warn!("[CLEAN] removal not supported by backend; left {:?} in {}", names, dir);
                false
            }
            RemoveOutcome::Failed(e) => {
                warn!("[CLEAN] failed to remove {:?} in {}: {}", names, dir, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::read_undo_records;
    use crate::services::local::LocalFs;

    fn touch(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn test_rename_suffixes_on_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "tv/A/a.mkv");
        touch(tmp.path(), "tv/A/b.mkv");
        let local = LocalFs::new(tmp.path());
        let mut ops = FsOps::new(&local, ConflictPolicy::Suffix, false, None);

        let path = ops.rename("/tv/A/a.mkv", "b.mkv").await.unwrap();
        assert_eq!(path, "/tv/A/b (1).mkv");
        // Second attempt keeps the numbered name.
        let again = ops.rename(&path, "b.mkv").await.unwrap();
        assert_eq!(again, path);
        assert_eq!(ops.take_trace().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_skip_policy() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "tv/A/a.mkv");
        touch(tmp.path(), "tv/A/b.mkv");
        let local = LocalFs::new(tmp.path());
        let mut ops = FsOps::new(&local, ConflictPolicy::Skip, false, None);

        let path = ops.rename("/tv/A/a.mkv", "b.mkv").await.unwrap();
        assert_eq!(path, "/tv/A/a.mkv");
        let trace = ops.take_trace();
        assert!(matches!(&trace[..], [Action::Skip { .. }]));
        assert!(tmp.path().join("tv/A/a.mkv").exists());
    }

    #[tokio::test]
    async fn test_move_conflict_renames_source_first() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "tv/A/01.mkv");
        touch(tmp.path(), "tv/A/01 (1).mkv");
        touch(tmp.path(), "tv/A/S01/01.mkv");
        let undo_path = tmp.path().join("undo.jsonl");
        let local = LocalFs::new(tmp.path());
        let ledger = UndoLedger::create(&undo_path).unwrap();
        let mut ops = FsOps::new(&local, ConflictPolicy::Suffix, false, Some(ledger));

        let moved = ops.move_into("/tv/A", "/tv/A/S01", "01.mkv").await.unwrap();
        assert_eq!(moved.as_deref(), Some("01 (2).mkv"));
        assert!(tmp.path().join("tv/A/S01/01 (2).mkv").exists());
        assert!(tmp.path().join("tv/A/01 (1).mkv").exists());

        let records = read_undo_records(&undo_path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("tv/A")).unwrap();
        let local = LocalFs::new(tmp.path());
        let mut ops = FsOps::new(&local, ConflictPolicy::Suffix, false, None);

        assert_eq!(ops.ensure_dir("/tv/A", "S01").await.unwrap(), "/tv/A/S01");
        assert_eq!(ops.ensure_dir("/tv/A", "S01").await.unwrap(), "/tv/A/S01");
        assert_eq!(ops.take_trace().len(), 1);
    }
}
