//! Dry-run overlay.
//!
//! Reads go to the real backend the first time a directory is seen; every
//! mutation is applied to an in-memory copy instead. Directories that were
//! renamed or moved keep an alias to their real location so their untouched
//! children can still be listed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::models::media::{DirEntry, SearchHit};
use crate::services::{RemoteFs, RemoveOutcome};
use crate::utils::fs::{is_within, join_path, norm_path, split_path};
use crate::{Error, Result};

#[derive(Default)]
struct Overlay {
    /// Virtual directory path → children (name → is_dir).
    dirs: HashMap<String, BTreeMap<String, bool>>,
    /// Virtual directory path → real backend path.
    aliases: HashMap<String, String>,
}

impl Overlay {
    fn real_path(&self, path: &str) -> String {
        self.aliases
            .iter()
            .filter(|(virt, _)| is_within(path, virt))
            .max_by_key(|(virt, _)| virt.len())
            .map(|(virt, real)| format!("{}{}", real, &path[virt.len()..]))
            .unwrap_or_else(|| path.to_string())
    }

    fn drop_subtree(&mut self, path: &str) {
        self.dirs.retain(|k, _| !is_within(k, path));
        self.aliases.retain(|k, _| !is_within(k, path));
    }

    /// Re-key everything below `from` to live below `to`.
    fn relocate(&mut self, from: &str, to: &str) {
        let real = self.real_path(from);
        self.drop_subtree(to);

        let moved: Vec<String> = self.dirs.keys().filter(|k| is_within(k, from)).cloned().collect();
        for key in moved {
            if let Some(children) = self.dirs.remove(&key) {
                self.dirs.insert(format!("{}{}", to, &key[from.len()..]), children);
            }
        }
        let moved: Vec<String> = self.aliases.keys().filter(|k| is_within(k, from)).cloned().collect();
        for key in moved {
            if let Some(real) = self.aliases.remove(&key) {
                self.aliases.insert(format!("{}{}", to, &key[from.len()..]), real);
            }
        }
        self.aliases.insert(to.to_string(), real);
    }
}

/// A [`RemoteFs`] that never mutates the wrapped backend.
pub struct DryRunFs<'a> {
    inner: &'a dyn RemoteFs,
    state: Mutex<Overlay>,
}

impl<'a> DryRunFs<'a> {
    pub fn new(inner: &'a dyn RemoteFs) -> Self {
        Self {
            inner,
            state: Mutex::new(Overlay::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Overlay> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make sure the virtual listing of `path` is loaded.
    async fn materialize(&self, path: &str) -> Result<()> {
        let real = {
            let state = self.lock();
            if state.dirs.contains_key(path) {
                return Ok(());
            }
            state.real_path(path)
        };
        let entries = self.inner.list(&real).await?;
        debug!("[DRY] loaded {} (backend {})", path, real);
        self.lock().dirs.entry(path.to_string()).or_insert_with(|| {
            entries.into_iter().map(|e| (e.name, e.is_dir)).collect()
        });
        Ok(())
    }
}

#[async_trait]
impl RemoteFs for DryRunFs<'_> {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = norm_path(path);
        self.materialize(&path).await?;
        let state = self.lock();
        let children = state
            .dirs
            .get(&path)
            .ok_or_else(|| Error::PathNotFound(path.clone()))?;
        Ok(children
            .iter()
            .map(|(name, is_dir)| DirEntry {
                name: name.clone(),
                is_dir: *is_dir,
            })
            .collect())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = norm_path(path);
        let (parent, name) = split_path(&path);
        self.materialize(&parent).await?;
        let mut state = self.lock();
        if let Some(children) = state.dirs.get_mut(&parent) {
            children.entry(name).or_insert(true);
        }
        state.dirs.entry(path).or_default();
        Ok(())
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
        let path = norm_path(path);
        let (parent, old) = split_path(&path);
        self.materialize(&parent).await?;

        let mut state = self.lock();
        let children = state
            .dirs
            .get_mut(&parent)
            .ok_or_else(|| Error::PathNotFound(parent.clone()))?;
        if children.contains_key(new_name) {
            return Err(Error::other(format!("{} already exists in {}", new_name, parent)));
        }
        let is_dir = children
            .remove(&old)
            .ok_or_else(|| Error::PathNotFound(path.clone()))?;
        children.insert(new_name.to_string(), is_dir);
        if is_dir {
            state.relocate(&path, &join_path(&parent, new_name));
        }
        Ok(())
    }

    async fn move_entries(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
        let src_dir = norm_path(src_dir);
        let dst_dir = norm_path(dst_dir);
        self.materialize(&src_dir).await?;
        self.materialize(&dst_dir).await?;

        let mut state = self.lock();
        for name in names {
            let is_dir = state
                .dirs
                .get_mut(&src_dir)
                .and_then(|children| children.remove(name))
                .ok_or_else(|| Error::PathNotFound(join_path(&src_dir, name)))?;
            let dst_children = state
                .dirs
                .get_mut(&dst_dir)
                .ok_or_else(|| Error::PathNotFound(dst_dir.clone()))?;
            if dst_children.contains_key(name) {
                return Err(Error::other(format!("{} already exists in {}", name, dst_dir)));
            }
            dst_children.insert(name.clone(), is_dir);
            if is_dir {
                state.relocate(&join_path(&src_dir, name), &join_path(&dst_dir, name));
            }
        }
        Ok(())
    }

    async fn remove(&self, dir: &str, names: &[String]) -> RemoveOutcome {
        let dir = norm_path(dir);
        if let Err(e) = self.materialize(&dir).await {
            return RemoveOutcome::Failed(e.to_string());
        }
        let mut state = self.lock();
        for name in names {
            if let Some(children) = state.dirs.get_mut(&dir) {
                children.remove(name);
            }
            state.drop_subtree(&join_path(&dir, name));
        }
        RemoveOutcome::Removed
    }

    /// Searches the real backend, so hits show the tree before any rehearsed change.
    async fn search(&self, parent: &str, keywords: &str) -> Result<Vec<SearchHit>> {
        let real = self.lock().real_path(&norm_path(parent));
        self.inner.search(&real, keywords).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::local::LocalFs;

    fn names(entries: &[DirEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_overlay_never_touches_backend() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("tv/Show/extras")).unwrap();
        std::fs::write(tmp.path().join("tv/Show/01.mp4"), b"x").unwrap();
        std::fs::write(tmp.path().join("tv/Show/extras/a.txt"), b"x").unwrap();

        let local = LocalFs::new(tmp.path());
        let dry = DryRunFs::new(&local);

        dry.mkdir("/tv/Show/S01").await.unwrap();
        dry.move_entries("/tv/Show", "/tv/Show/S01", &["01.mp4".to_string()])
            .await
            .unwrap();
        dry.rename("/tv/Show", "Show (2020)").await.unwrap();

        let root = dry.list("/tv").await.unwrap();
        assert_eq!(names(&root), vec!["Show (2020)"]);
        let season = dry.list("/tv/Show (2020)/S01").await.unwrap();
        assert_eq!(names(&season), vec!["01.mp4"]);
        // Unloaded children resolve through the alias to the real directory.
        let extras = dry.list("/tv/Show (2020)/extras").await.unwrap();
        assert_eq!(names(&extras), vec!["a.txt"]);

        assert!(tmp.path().join("tv/Show/01.mp4").exists());
        assert!(!tmp.path().join("tv/Show (2020)").exists());
    }

    #[tokio::test]
    async fn test_overlay_remove_and_conflicts() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("tv/A")).unwrap();
        std::fs::write(tmp.path().join("tv/A/ad.url"), b"x").unwrap();
        std::fs::write(tmp.path().join("tv/A/b.mkv"), b"x").unwrap();

        let local = LocalFs::new(tmp.path());
        let dry = DryRunFs::new(&local);
        assert!(dry.rename("/tv/A/ad.url", "b.mkv").await.is_err());
        assert_eq!(
            dry.remove("/tv/A", &["ad.url".to_string()]).await,
            RemoveOutcome::Removed
        );
        assert_eq!(names(&dry.list("/tv/A").await.unwrap()), vec!["b.mkv"]);
        assert!(tmp.path().join("tv/A/ad.url").exists());
    }
}
