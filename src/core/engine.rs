//! Reconciliation engine.
//!
//! Turns one series folder into the canonical layout:
//!
//! ```text
//! {Title} ({Year})/
//!   S01/
//!     {Title} ({Year}) - S01E01 - 2160p.mkv
//!     {Title} ({Year}) - S01E01.chs.srt
//!   Specials/
//! ```
//!
//! Steps, in order: collection detection, identity resolution, series rename,
//! junk cleanup, subtitle relocation, season-bundle flattening, season folder
//! normalization, episode placement (per scan folder), an in-place pass over
//! every season folder, and finally nested shows. Each step only acts on what
//! is not already canonical, so a second run performs no mutations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, error, info};

use crate::core::assist;
use crate::core::classify::{
    contains_junk_marker, find_library_root, has_any_season_hint, has_container_words,
    is_misc_dir_name, is_same_show_container_folder, is_season_container,
    looks_like_show_folder_name, season_dir_number, SkipRules,
};
use crate::core::cleanup::{relocate_subtitles, remove_junk};
use crate::core::ops::FsOps;
use crate::core::parser::{best_english_title, extract_year_hint, parse_episode, parse_episode_folder};
use crate::core::resolver::MetadataResolver;
use crate::core::variety::{plan_variety_episodes, VarietyPlan};
use crate::generators::filename::{
    episode_file_name, needs_series_prefix, prefixed_episode_file_name, related_sidecars,
    sidecar_file_name,
};
use crate::generators::folder::{season_folder_name, series_folder_name};
use crate::models::config::ReconcileConfig;
use crate::models::media::{DirEntry, SeriesContext};
use crate::models::plan::{FolderOutcome, SeriesReport, SkipReason};
use crate::services::ChatAssistant;
use crate::utils::fs::{basename, is_video_file, join_path, norm_path, split_ext};
use crate::Result;

/// Sample size handed to the resolver.
const SAMPLE_FILES: usize = 8;
/// Files inspected for episode statistics.
const STAT_FILES: usize = 200;
/// Subfolders peeked into when the series root holds no videos.
const PEEK_DIRS: usize = 3;

/// The show being reconciled.
struct ShowScope {
    path: String,
    /// Canonical `{Title} ({Year})`.
    title: String,
    /// Folder name before any renaming.
    original_name: String,
    /// Original season folder names, by season.
    season_names: HashMap<u32, String>,
}

/// One video to place and rename, with its sidecars.
struct EpisodeJob<'j> {
    src_dir: &'j str,
    dst_dir: &'j str,
    video: &'j str,
    sidecars: Vec<String>,
    season: u32,
    episode: u32,
    tagged: bool,
    context: String,
}

fn join_context(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn claim(candidates: Vec<String>, claimed: &mut HashSet<String>) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|name| claimed.insert(name.clone()))
        .collect()
}

pub struct Reconciler<'a> {
    settings: &'a ReconcileConfig,
    roots: Vec<String>,
    skip: SkipRules,
    ops: FsOps<'a>,
    resolver: MetadataResolver<'a>,
    assistant: Option<&'a dyn ChatAssistant>,
    stop: Arc<AtomicBool>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        settings: &'a ReconcileConfig,
        roots: &[String],
        ops: FsOps<'a>,
        resolver: MetadataResolver<'a>,
        assistant: Option<&'a dyn ChatAssistant>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        Ok(Self {
            settings,
            roots: roots.iter().map(|r| norm_path(r)).collect(),
            skip: SkipRules::new(settings.skip_dir_regex.as_deref())?,
            ops,
            resolver,
            assistant,
            stop,
        })
    }

    pub fn resolver(&self) -> &MetadataResolver<'a> {
        &self.resolver
    }

    pub fn ops(&self) -> &FsOps<'a> {
        &self.ops
    }

    fn stopped(&self) -> bool {
        let stopped = self.stop.load(Ordering::SeqCst);
        if stopped {
            info!("[STOP] stop requested, leaving the current series");
        }
        stopped
    }

    /// Reconcile one series folder and report every decision taken.
    pub async fn reconcile_series(&mut self, path: &str) -> Result<SeriesReport> {
        self.ops.take_trace();
        let series_path = norm_path(path);
        let outcome = self.reconcile_folder(series_path.clone(), 0).await?;
        Ok(SeriesReport {
            series_path,
            outcome,
            actions: self.ops.take_trace(),
        })
    }

    fn reconcile_folder<'b>(
        &'b mut self,
        path: String,
        depth: usize,
    ) -> LocalBoxFuture<'b, Result<FolderOutcome>> {
        async move {
            let path = norm_path(&path);
            if self.stopped() {
                return Ok(FolderOutcome::Stopped { path });
            }
            if depth > self.settings.max_depth {
                self.ops.skip(&path, format!("nesting too deep ({})", depth));
                return Ok(FolderOutcome::Skipped {
                    path,
                    reason: SkipReason::TooDeep(depth),
                });
            }

            let folder_name = basename(&path);
            let library_root = find_library_root(&path, &self.roots);
            let entries = self.ops.list(&path).await?;
            if entries.is_empty() {
                self.ops.skip(&path, "empty folder");
                return Ok(FolderOutcome::Skipped {
                    path,
                    reason: SkipReason::Empty,
                });
            }

            if let Some(children) = self.collection_children(&folder_name, &entries) {
                info!("[INFO] collection folder {} ({} shows)", path, children.len());
                for child in children {
                    let child_path = join_path(&path, &child);
                    match self.reconcile_folder(child_path.clone(), depth + 1).await {
                        Ok(FolderOutcome::Reconciled { path: done }) => {
                            if let Err(e) = self.ops.move_folder_to(&done, &library_root).await {
                                error!("[ERROR] cannot move {} to {}: {}", done, library_root, e);
                            }
                        }
                        Ok(FolderOutcome::Stopped { .. }) => {
                            return Ok(FolderOutcome::Stopped { path });
                        }
                        Ok(_) => {}
                        Err(e) => error!("[ERROR] failed to reconcile {}: {}", child_path, e),
                    }
                }
                return Ok(FolderOutcome::Collection { path });
            }

            self.reconcile_show(path, folder_name, library_root, entries, depth)
                .await
        }
        .boxed_local()
    }

    /// Children to reconcile individually when `entries` describe a collection.
    fn collection_children(&self, folder_name: &str, entries: &[DirEntry]) -> Option<Vec<String>> {
        let has_video = entries.iter().any(|e| !e.is_dir && is_video_file(&e.name));
        let has_season = entries
            .iter()
            .any(|e| e.is_dir && season_dir_number(&e.name).is_some());
        if has_video || has_season {
            return None;
        }

        let children: Vec<String> = entries
            .iter()
            .filter(|e| e.is_dir && !self.skip.should_skip(&e.name))
            .map(|e| e.name.clone())
            .collect();
        let shows: Vec<String> = children
            .iter()
            .filter(|name| looks_like_show_folder_name(name))
            .cloned()
            .collect();

        if shows.len() >= 2 {
            Some(shows)
        } else if has_container_words(folder_name) && children.len() >= 2 {
            Some(if shows.is_empty() { children } else { shows })
        } else {
            None
        }
    }

    async fn gather_context(&self, path: &str, folder_name: &str, entries: &[DirEntry]) -> SeriesContext {
        let mut videos: Vec<String> = entries
            .iter()
            .filter(|e| !e.is_dir && is_video_file(&e.name))
            .map(|e| e.name.clone())
            .collect();

        if videos.is_empty() {
            let mut subdirs: Vec<&DirEntry> = entries
                .iter()
                .filter(|e| e.is_dir && !is_misc_dir_name(&e.name) && !self.skip.should_skip(&e.name))
                .collect();
            subdirs.sort_by_key(|e| (season_dir_number(&e.name).is_none(), e.name.clone()));
            for dir in subdirs.into_iter().take(PEEK_DIRS) {
                match self.ops.list(&join_path(path, &dir.name)).await {
                    Ok(children) => videos.extend(
                        children
                            .into_iter()
                            .filter(|c| !c.is_dir && is_video_file(&c.name))
                            .map(|c| c.name),
                    ),
                    Err(e) => debug!("cannot peek into {}: {}", dir.name, e),
                }
                if !videos.is_empty() {
                    break;
                }
            }
        }

        let sample_files: Vec<String> = videos.iter().take(SAMPLE_FILES).cloned().collect();
        let english_title = best_english_title(&sample_files);
        let episodes: Vec<u32> = videos
            .iter()
            .take(STAT_FILES)
            .filter_map(|name| parse_episode(name).episode)
            .collect();
        let distinct: HashSet<u32> = episodes.iter().copied().collect();

        SeriesContext {
            year_hint: extract_year_hint(folder_name),
            english_title,
            sample_files,
            max_episode: episodes.iter().copied().max(),
            episode_file_count: (!distinct.is_empty()).then_some(distinct.len()),
            extra_queries: Vec::new(),
        }
    }

    async fn reconcile_show(
        &mut self,
        path: String,
        folder_name: String,
        library_root: String,
        entries: Vec<DirEntry>,
        depth: usize,
    ) -> Result<FolderOutcome> {
        let context = self.gather_context(&path, &folder_name, &entries).await;
        let Some(series) = self.resolver.resolve(&folder_name, &context).await? else {
            self.ops.skip(&path, "no catalog match");
            return Ok(FolderOutcome::Skipped {
                path,
                reason: SkipReason::NotFound,
            });
        };

        let title = series_folder_name(&series);
        let series_path = if self.settings.rename_series {
            self.ops.rename(&path, &title).await?
        } else {
            path
        };

        if self.settings.delete_junk {
            remove_junk(&mut self.ops, &series_path).await;
        }
        relocate_subtitles(&mut self.ops, &series_path, &self.settings.season_format).await?;
        self.flatten_season_bundles(&series_path).await?;
        let season_names = self.normalize_season_dirs(&series_path).await?;

        let scope = ShowScope {
            path: series_path,
            title,
            original_name: folder_name,
            season_names,
        };

        let (scan_dirs, nested) = self.split_scan_dirs(&scope).await?;
        let root_hint = season_dir_number(&basename(&scope.path)).or(series.season_hint);
        let mut hints: HashMap<String, u32> = HashMap::new();
        let mut listings = Vec::with_capacity(scan_dirs.len());
        for dir in &scan_dirs {
            let hint = if *dir == scope.path {
                root_hint
            } else {
                season_dir_number(&basename(dir))
            };
            if let Some(hint) = hint {
                hints.insert(dir.clone(), hint);
            }
            listings.push((dir.clone(), self.ops.list(dir).await?));
        }
        let plan = plan_variety_episodes(&listings, &hints, self.settings.default_season);

        for dir in &scan_dirs {
            if !self
                .place_scan_dir(&scope, dir, hints.get(dir).copied(), &plan, &nested)
                .await?
            {
                return Ok(FolderOutcome::Stopped { path: scope.path });
            }
        }

        if !self.finish_season_dirs(&scope).await? {
            return Ok(FolderOutcome::Stopped { path: scope.path });
        }

        if !nested.is_empty() {
            info!("[INFO] {} nested shows under {}", nested.len(), scope.path);
        }
        for child in nested {
            match self.reconcile_folder(child.clone(), depth + 1).await {
                Ok(FolderOutcome::Reconciled { path: done }) => {
                    if let Err(e) = self.ops.move_folder_to(&done, &library_root).await {
                        error!("[ERROR] cannot move {} to {}: {}", done, library_root, e);
                    }
                }
                Ok(FolderOutcome::Stopped { .. }) => {
                    return Ok(FolderOutcome::Stopped { path: scope.path });
                }
                Ok(_) => {}
                Err(e) => error!("[ERROR] failed to reconcile nested show {}: {}", child, e),
            }
        }

        Ok(FolderOutcome::Reconciled { path: scope.path })
    }

    /// Lift season folders out of bundles such as `S1-S3` or `1-4季`.
    async fn flatten_season_bundles(&mut self, series_path: &str) -> Result<()> {
        let entries = self.ops.list(series_path).await?;
        for bundle in entries.iter().filter(|e| e.is_dir && is_season_container(&e.name)) {
            let bundle_path = join_path(series_path, &bundle.name);
            info!("[INFO] flattening season bundle {}", bundle_path);
            let children = self.ops.list(&bundle_path).await?;
            for child in children
                .iter()
                .filter(|c| c.is_dir && season_dir_number(&c.name).is_some())
            {
                self.ops.move_into(&bundle_path, series_path, &child.name).await?;
            }
        }
        Ok(())
    }

    /// Rename season folders to the configured format, merging into an existing canonical folder.
    ///
    /// Returns the original folder name of each season.
    async fn normalize_season_dirs(&mut self, series_path: &str) -> Result<HashMap<u32, String>> {
        let entries = self.ops.list(series_path).await?;
        let mut originals = HashMap::new();
        for entry in entries.iter().filter(|e| e.is_dir) {
            let Some(season) = season_dir_number(&entry.name) else {
                continue;
            };
            let desired = season_folder_name(season, &self.settings.season_format);
            if entry.name == desired {
                originals.entry(season).or_insert_with(|| entry.name.clone());
                continue;
            }
            originals.insert(season, entry.name.clone());
            let entry_path = join_path(series_path, &entry.name);
            let current = self.ops.list(series_path).await?;
            if current.iter().any(|e| e.is_dir && e.name == desired) {
                let target = join_path(series_path, &desired);
                info!("[MERGE] {} -> {}", entry_path, target);
                for child in self.ops.list(&entry_path).await? {
                    self.ops.move_into(&entry_path, &target, &child.name).await?;
                }
            } else {
                self.ops.rename(&entry_path, &desired).await?;
            }
        }
        Ok(originals)
    }

    /// Folders scanned for loose episodes (the root first), and nested shows.
    async fn split_scan_dirs(&self, scope: &ShowScope) -> Result<(Vec<String>, Vec<String>)> {
        let mut scan_dirs = vec![scope.path.clone()];
        let mut nested = Vec::new();
        for entry in self.ops.list(&scope.path).await? {
            if !entry.is_dir
                || season_dir_number(&entry.name).is_some()
                || self.skip.should_skip(&entry.name)
            {
                continue;
            }
            let dir = join_path(&scope.path, &entry.name);
            if looks_like_show_folder_name(&entry.name)
                && !is_same_show_container_folder(&entry.name, &scope.title)
            {
                nested.push(dir);
            } else {
                scan_dirs.push(dir);
            }
        }
        Ok((scan_dirs, nested))
    }

    async fn ensure_season_dir(&mut self, series_path: &str, season: u32) -> Result<String> {
        let name = season_folder_name(season, &self.settings.season_format);
        self.ops.ensure_dir(series_path, &name).await
    }

    /// Season for a numbered file without a season of its own.
    async fn loose_season(&self, scope: &ShowScope, scan_name: &str, video: &str, known: Option<u32>) -> u32 {
        if let Some(season) = known {
            return season;
        }
        if self.settings.ai_infer_season && has_any_season_hint(&[&scope.original_name, scan_name]) {
            if let Some(ai) = self.assistant {
                if let Some(season) = assist::infer_season(ai, &scope.original_name, scan_name, video).await {
                    info!("[AI] inferred season {} for {} in {}", season, video, scan_name);
                    return season;
                }
            }
        }
        self.settings.default_season
    }

    /// Place every episode found directly in `scan_dir`. Returns `false` when stopped.
    async fn place_scan_dir(
        &mut self,
        scope: &ShowScope,
        scan_dir: &str,
        hint: Option<u32>,
        plan: &VarietyPlan,
        nested: &[String],
    ) -> Result<bool> {
        let scan_name = basename(scan_dir);
        let entries = self.ops.list(scan_dir).await?;
        let mut claimed: HashSet<String> = HashSet::new();

        for entry in &entries {
            if self.stopped() {
                return Ok(false);
            }
            if entry.is_dir {
                let dir = join_path(scan_dir, &entry.name);
                if !nested.contains(&dir) {
                    self.place_episode_folder(scope, &dir, &scan_name, hint).await?;
                }
                continue;
            }
            if !is_video_file(&entry.name) {
                continue;
            }

            let facts = parse_episode(&entry.name);
            let (season, episode) = match facts.episode {
                Some(episode) => {
                    let known = facts.season.or(hint);
                    (self.loose_season(scope, &scan_name, &entry.name, known).await, episode)
                }
                None => match plan.get(&(scan_dir.to_string(), entry.name.clone())) {
                    Some(planned) => (planned.season, planned.episode),
                    None => {
                        debug!("[SKIP] no episode number: {}", join_path(scan_dir, &entry.name));
                        continue;
                    }
                },
            };

            let sidecars = claim(related_sidecars(&entries, &entry.name, season, episode), &mut claimed);
            let dst = self.ensure_season_dir(&scope.path, season).await?;
            let job = EpisodeJob {
                src_dir: scan_dir,
                dst_dir: &dst,
                video: &entry.name,
                sidecars,
                season,
                episode,
                tagged: facts.already_tagged,
                context: join_context(&[&facts.quality_tail, &scan_name, &scope.original_name]),
            };
            self.place_episode(scope, job).await?;
        }
        Ok(true)
    }

    /// One folder per episode: `<series>/第01集/<video + subtitles>`.
    async fn place_episode_folder(
        &mut self,
        scope: &ShowScope,
        dir: &str,
        scan_name: &str,
        hint: Option<u32>,
    ) -> Result<()> {
        let name = basename(dir);
        if self.skip.should_skip(&name) {
            return Ok(());
        }
        let folder = parse_episode_folder(&name);
        let Some(folder_episode) = folder.episode else {
            return Ok(());
        };
        if season_dir_number(&name).is_some() && !folder.already_tagged {
            return Ok(());
        }
        let folder_season = folder
            .season
            .or(hint)
            .unwrap_or(self.settings.default_season);

        let entries = self.ops.list(dir).await?;
        let mut claimed: HashSet<String> = HashSet::new();
        for video in entries.iter().filter(|e| !e.is_dir && is_video_file(&e.name)) {
            let facts = parse_episode(&video.name);
            let season = facts.season.unwrap_or(folder_season);
            let episode = facts.episode.unwrap_or(folder_episode);
            let sidecars = claim(related_sidecars(&entries, &video.name, season, episode), &mut claimed);
            let dst = self.ensure_season_dir(&scope.path, season).await?;
            let job = EpisodeJob {
                src_dir: dir,
                dst_dir: &dst,
                video: &video.name,
                sidecars,
                season,
                episode,
                tagged: facts.already_tagged,
                context: join_context(&[&facts.quality_tail, scan_name, &scope.original_name]),
            };
            self.place_episode(scope, job).await?;
        }
        Ok(())
    }

    /// In-place pass over every season folder. Returns `false` when stopped.
    async fn finish_season_dirs(&mut self, scope: &ShowScope) -> Result<bool> {
        for entry in self.ops.list(&scope.path).await? {
            if !entry.is_dir {
                continue;
            }
            let Some(season) = season_dir_number(&entry.name) else {
                continue;
            };
            let season_path = join_path(&scope.path, &entry.name);
            if self.settings.delete_junk {
                remove_junk(&mut self.ops, &season_path).await;
            }

            let entries = self.ops.list(&season_path).await?;
            let mut claimed: HashSet<String> = HashSet::new();
            for video in entries.iter().filter(|e| !e.is_dir && is_video_file(&e.name)) {
                if self.stopped() {
                    return Ok(false);
                }
                let facts = parse_episode(&video.name);
                let Some(episode) = facts.episode else {
                    debug!("[SKIP] no episode number: {}", join_path(&season_path, &video.name));
                    continue;
                };
                let file_season = facts.season.unwrap_or(season);
                let season_hint = scope
                    .season_names
                    .get(&file_season)
                    .or_else(|| scope.season_names.get(&season))
                    .map(String::as_str)
                    .unwrap_or_default();
                let sidecars = claim(
                    related_sidecars(&entries, &video.name, file_season, episode),
                    &mut claimed,
                );
                let job = EpisodeJob {
                    src_dir: &season_path,
                    dst_dir: &season_path,
                    video: &video.name,
                    sidecars,
                    season: file_season,
                    episode,
                    tagged: facts.already_tagged,
                    context: join_context(&[
                        &facts.quality_tail,
                        season_hint,
                        &entry.name,
                        &scope.original_name,
                    ]),
                };
                self.place_episode(scope, job).await?;
            }
        }
        Ok(true)
    }

    /// The name a video should end up with, or `None` to keep it.
    fn target_video_name(&self, scope: &ShowScope, job: &EpisodeJob<'_>, current: &str) -> Option<String> {
        if !job.tagged || !self.settings.protect_tagged || contains_junk_marker(current) {
            Some(episode_file_name(&scope.title, job.season, job.episode, current, &job.context))
        } else if self.settings.fix_bare_tagged && needs_series_prefix(current, &scope.title) {
            Some(prefixed_episode_file_name(&scope.title, job.season, job.episode, current))
        } else {
            None
        }
    }

    /// Move a video and its sidecars into place, then rename them.
    async fn place_episode(&mut self, scope: &ShowScope, job: EpisodeJob<'_>) -> Result<()> {
        let mut video = job.video.to_string();
        let mut sidecars = job.sidecars.clone();
        if norm_path(job.src_dir) != norm_path(job.dst_dir) {
            match self.ops.move_into(job.src_dir, job.dst_dir, job.video).await? {
                Some(name) => video = name,
                None => return Ok(()),
            }
            let mut moved = Vec::with_capacity(sidecars.len());
            for sidecar in &sidecars {
                if let Some(name) = self.ops.move_into(job.src_dir, job.dst_dir, sidecar).await? {
                    moved.push(name);
                }
            }
            sidecars = moved;
        }

        if !self.settings.rename_files {
            return Ok(());
        }
        let new_path = match self.target_video_name(scope, &job, &video) {
            Some(target) => self.ops.rename(&join_path(job.dst_dir, &video), &target).await?,
            None => join_path(job.dst_dir, &video),
        };

        let old_stem = split_ext(job.video).0;
        let new_name = basename(&new_path);
        let new_stem = split_ext(&new_name).0;
        for sidecar in sidecars {
            let renamed = sidecar_file_name(new_stem, &sidecar, old_stem);
            self.ops.rename(&join_path(job.dst_dir, &sidecar), &renamed).await?;
        }
        Ok(())
    }
}
