//! Local-disk backend.
//!
//! Serves remote-style paths (`/tv/Show`) from a base directory, so a library
//! mounted locally (or a test fixture) can be reconciled without AList.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::models::media::DirEntry;
use crate::services::{RemoteFs, RemoveOutcome};
use crate::utils::fs::{join_path, norm_path, split_path};
use crate::{Error, Result};

pub struct LocalFs {
    base: PathBuf,
}

impl LocalFs {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// Map a remote path to a local one. `..` components are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let path = norm_path(path);
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidPath(path));
        }
        Ok(self.base.join(relative))
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::InvalidPath(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteFs for LocalFs {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        if !dir.exists() {
            return Err(Error::PathNotFound(norm_path(path)));
        }
        if !dir.is_dir() {
            return Err(Error::NotADirectory(norm_path(path)));
        }

        let mut entries = Vec::new();
        let mut reader = fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().await?.is_dir();
            entries.push(DirEntry { name, is_dir });
        }
        Ok(entries)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(path)?).await?;
        Ok(())
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
        Self::check_name(new_name)?;
        let (parent, _) = split_path(path);
        let from = self.resolve(path)?;
        let to = self.resolve(&join_path(&parent, new_name))?;
        if !from.exists() {
            return Err(Error::PathNotFound(norm_path(path)));
        }
        if to.exists() {
            return Err(Error::other(format!("{} already exists", to.display())));
        }
        fs::rename(&from, &to).await?;
        debug!("renamed {} -> {}", from.display(), to.display());
        Ok(())
    }

    async fn move_entries(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
        let src = self.resolve(src_dir)?;
        let dst = self.resolve(dst_dir)?;
        if !dst.is_dir() {
            return Err(Error::NotADirectory(norm_path(dst_dir)));
        }
        for name in names {
            Self::check_name(name)?;
            let from = src.join(name);
            let to = dst.join(name);
            if !from.exists() {
                return Err(Error::PathNotFound(join_path(src_dir, name)));
            }
            if to.exists() {
                return Err(Error::other(format!("{} already exists", to.display())));
            }
            fs::rename(&from, &to).await?;
        }
        Ok(())
    }

    async fn remove(&self, dir: &str, names: &[String]) -> RemoveOutcome {
        let base = match self.resolve(dir) {
            Ok(base) => base,
            Err(e) => return RemoveOutcome::Failed(e.to_string()),
        };
        for name in names {
            let target = base.join(name);
            let result = if target.is_dir() {
                fs::remove_dir_all(&target).await
            } else {
                fs::remove_file(&target).await
            };
            if let Err(e) = result {
                return RemoveOutcome::Failed(format!("{}: {}", target.display(), e));
            }
        }
        RemoveOutcome::Removed
    }
}
