//! CLI command implementations.

pub mod check;
pub mod parse;
pub mod run;
pub mod search;
pub mod undo;

use crate::core::discovery::discover_tv_roots;
use crate::models::config::{Backend, Config};
use crate::services::ai::AiClient;
use crate::services::alist::AlistClient;
use crate::services::local::LocalFs;
use crate::services::RemoteFs;
use crate::{Error, Result};

/// Open the configured storage backend.
pub fn open_backend(config: &Config) -> Result<Box<dyn RemoteFs>> {
    match config.library.backend {
        Backend::Alist => Ok(Box::new(AlistClient::new(&config.alist)?)),
        Backend::Local => {
            let root = config.library.local_root.as_ref().ok_or_else(|| {
                Error::InvalidConfig("local backend needs [library].local_root or --local-root".to_string())
            })?;
            if !root.is_dir() {
                return Err(Error::NotADirectory(root.display().to_string()));
            }
            Ok(Box::new(LocalFs::new(root)))
        }
    }
}

/// The assistant, when enabled and configured.
pub fn open_assistant(config: &Config) -> Option<AiClient> {
    if !config.ai.is_active() {
        return None;
    }
    match AiClient::new(&config.ai) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!("[AI] disabled: {}", e);
            None
        }
    }
}

/// The configured library roots, or the discovered ones when none are
/// configured and discovery is on.
pub async fn library_roots(config: &Config, fs: &dyn RemoteFs) -> Result<Vec<String>> {
    if !config.library.roots.is_empty() || !config.library.auto_roots {
        return Ok(config.library.roots.clone());
    }
    discover_tv_roots(fs, &config.library, Some(&config.paths.roots_cache_file)).await
}
