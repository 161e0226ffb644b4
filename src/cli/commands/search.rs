//! Search command implementation.
//!
//! Shows which series folders a keyword would select, without touching them.

use colored::Colorize;

use super::{library_roots, open_assistant, open_backend};
use crate::core::classify::SkipRules;
use crate::core::discovery::{find_series_by_keyword, pick_among};
use crate::models::config::Config;
use crate::services::ChatAssistant;
use crate::{Error, Result};

/// Print the folders matching `keyword`, best first, and the one a run would pick.
pub async fn search(config: &Config, keyword: &str) -> Result<Vec<String>> {
    if config.library.roots.is_empty() && !config.library.auto_roots {
        return Err(Error::NoLibraryRoots);
    }
    let backend = open_backend(config)?;
    let roots = library_roots(config, backend.as_ref()).await?;
    if roots.is_empty() {
        return Err(Error::NoLibraryRoots);
    }
    let skip = SkipRules::new(config.reconcile.skip_dir_regex.as_deref())?;
    let ai = open_assistant(config);
    let assistant = ai.as_ref().map(|a| a as &dyn ChatAssistant);

    let hits = find_series_by_keyword(backend.as_ref(), &roots, keyword, &skip).await?;
    if hits.is_empty() {
        println!("{} no folder matches '{}'", "[INFO]".yellow(), keyword);
        return Ok(hits);
    }

    println!("{} {} folder(s) match '{}':", "[INFO]".cyan(), hits.len(), keyword);
    for (idx, path) in hits.iter().enumerate() {
        println!("  {:>3}. {}", idx + 1, path);
    }

    let selected = pick_among(hits, keyword, assistant).await;
    println!();
    for path in &selected {
        println!("{} {}", "Selected:".bold().green(), path);
    }
    Ok(selected)
}
