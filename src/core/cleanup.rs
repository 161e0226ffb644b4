//! Junk removal and subtitle relocation.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::core::classify::{is_junk_dir, is_junk_file, is_subtitle_dir_name};
use crate::core::ops::FsOps;
use crate::core::parser::{parse_episode, parse_season};
use crate::generators::folder::season_folder_name;
use crate::utils::fs::{is_subtitle_file, join_path};
use crate::Result;

/// Remove advertising files and junk folders directly inside `dir`.
///
/// Best effort: listing or removal failures are logged and ignored.
pub async fn remove_junk(ops: &mut FsOps<'_>, dir: &str) {
    let entries = match ops.list(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("[CLEAN] cannot list {}: {}", dir, e);
            return;
        }
    };

    let files: Vec<String> = entries
        .iter()
        .filter(|e| !e.is_dir && is_junk_file(&e.name))
        .map(|e| e.name.clone())
        .collect();
    let dirs: Vec<String> = entries
        .iter()
        .filter(|e| e.is_dir && is_junk_dir(&e.name))
        .map(|e| e.name.clone())
        .collect();

    ops.remove(dir, files).await;
    ops.remove(dir, dirs).await;
}

/// Move subtitles out of `Subs`/`字幕` style folders into the matching season folder.
///
/// The season comes from the subtitle name, then from the season folder it
/// sits in, then from the only season folder of the series, and finally 1.
pub async fn relocate_subtitles(ops: &mut FsOps<'_>, series_path: &str, season_format: &str) -> Result<()> {
    let entries = ops.list(series_path).await?;

    let mut seasons: BTreeMap<u32, String> = BTreeMap::new();
    for e in entries.iter().filter(|e| e.is_dir) {
        if let Some(season) = parse_season(&e.name) {
            seasons.insert(season, join_path(series_path, &e.name));
        }
    }
    let only_season = if seasons.len() == 1 {
        seasons.keys().next().copied()
    } else {
        None
    };

    let sub_dirs: Vec<String> = entries
        .iter()
        .filter(|e| e.is_dir && is_subtitle_dir_name(&e.name))
        .map(|e| join_path(series_path, &e.name))
        .collect();

    for sub_dir in sub_dirs {
        let mut sources: Vec<(String, Option<u32>)> = vec![(sub_dir.clone(), None)];
        match ops.list(&sub_dir).await {
            Ok(children) => {
                for child in children.iter().filter(|c| c.is_dir) {
                    if let Some(season) = parse_season(&child.name) {
                        sources.push((join_path(&sub_dir, &child.name), Some(season)));
                    }
                }
            }
            Err(e) => {
                warn!("[SUB] cannot list {}: {}", sub_dir, e);
                continue;
            }
        }

        for (source, dir_hint) in sources {
            let files = match ops.list(&source).await {
                Ok(files) => files,
                Err(e) => {
                    warn!("[SUB] cannot list {}: {}", source, e);
                    continue;
                }
            };
            for file in files.iter().filter(|f| !f.is_dir && is_subtitle_file(&f.name)) {
                let season = parse_episode(&file.name)
                    .season
                    .or(dir_hint)
                    .or(only_season)
                    .unwrap_or(1);

                let target = match seasons.get(&season) {
                    Some(path) => path.clone(),
                    None => {
                        let path = ops
                            .ensure_dir(series_path, &season_folder_name(season, season_format))
                            .await?;
                        seasons.insert(season, path.clone());
                        path
                    }
                };

                if let Some(name) = ops.move_into(&source, &target, &file.name).await? {
                    debug!("[SUB] {} -> {}/{}", file.name, target, name);
                }
            }
        }
        info!("[SUB] relocated subtitles from {}", sub_dir);
    }
    Ok(())
}
