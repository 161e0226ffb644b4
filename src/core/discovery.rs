//! Library root discovery and series folder selection under the roots.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::core::assist;
use crate::core::classify::SkipRules;
use crate::models::config::LibraryConfig;
use crate::services::{ChatAssistant, RemoteFs};
use crate::utils::chinese::similarity;
use crate::utils::fs::{basename, join_path, norm_path};
use crate::Result;

/// Folders expanded below a storage while looking for category folders.
const HUB_DIRS: &[&str] = &["媒体", "Media", "media"];
/// Hub levels expanded below each storage.
const HUB_DEPTH: usize = 2;

static DEFAULT_STORAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^OneDrive-").expect("valid regex"));

static MATCH_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-_.·•]+").expect("valid regex"));
static MATCH_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]【】()（）{}<>《》]").expect("valid regex"));
static BRACKETED_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]|\([^)]+\)").expect("valid regex"));

fn match_key(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let no_sep = MATCH_SEPARATORS.replace_all(&lower, "");
    MATCH_BRACKETS.replace_all(&no_sep, "").into_owned()
}

fn rank_key(path: &str) -> String {
    let name = basename(path);
    BRACKETED_GROUP
        .replace_all(&name, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn cache_key(library: &LibraryConfig) -> String {
    format!("{}|{}", library.root_regex, library.categories.join(","))
}

/// Roots cached under `key`, if the cache file is younger than `ttl`.
fn cached_roots(path: &Path, key: &str, ttl: Duration) -> Option<Vec<String>> {
    let age = std::fs::metadata(path).ok()?.modified().ok()?.elapsed().ok()?;
    if age >= ttl {
        debug!("[DISCOVER] cache {} is stale", path.display());
        return None;
    }
    let content = std::fs::read_to_string(path).ok()?;
    let cache: BTreeMap<String, Vec<String>> = serde_json::from_str(&content).ok()?;
    cache
        .get(key)
        .filter(|roots| !roots.is_empty())
        .map(|roots| roots.iter().map(|r| norm_path(r)).collect())
}

/// Merge `roots` into the cache file under `key`.
fn save_roots(path: &Path, key: &str, roots: &[String]) -> Result<()> {
    let mut cache: BTreeMap<String, Vec<String>> = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default();
    cache.insert(key.to_string(), roots.to_vec());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&cache)?)?;
    Ok(())
}

async fn dir_names(fs: &dyn RemoteFs, path: &str) -> Vec<String> {
    match fs.list(path).await {
        Ok(entries) => {
            let mut names: Vec<String> = entries.into_iter().filter(|e| e.is_dir).map(|e| e.name).collect();
            names.sort();
            names
        }
        Err(e) => {
            warn!("[DISCOVER] cannot list {}: {}", path, e);
            Vec::new()
        }
    }
}

/// TV library roots: the category folders (`电视剧`, `动漫`) of every storage
/// whose name matches the storage pattern, found directly in the storage or
/// below a `媒体`/`Media` hub.
///
/// A cache younger than the configured TTL answers without any listing.
pub async fn discover_tv_roots(
    fs: &dyn RemoteFs,
    library: &LibraryConfig,
    cache_file: Option<&Path>,
) -> Result<Vec<String>> {
    let key = cache_key(library);
    let ttl = Duration::from_secs(library.roots_cache_ttl_days.saturating_mul(86_400));
    if let Some(roots) = cache_file.and_then(|path| cached_roots(path, &key, ttl)) {
        info!("[DISCOVER] {} roots from cache", roots.len());
        return Ok(roots);
    }

    let pattern = Regex::new(&library.root_regex).unwrap_or_else(|e| {
        warn!("[DISCOVER] bad storage pattern '{}' ({}), using ^OneDrive-", library.root_regex, e);
        DEFAULT_STORAGE_PATTERN.clone()
    });

    let mut storages: Vec<String> = fs
        .list("/")
        .await?
        .into_iter()
        .filter(|e| e.is_dir && pattern.is_match(&e.name))
        .map(|e| join_path("/", &e.name))
        .collect();
    storages.sort();
    debug!("[DISCOVER] {} matching storages", storages.len());

    let mut roots: Vec<String> = Vec::new();
    for storage in storages {
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(storage, 0)]);
        while let Some((dir, depth)) = queue.pop_front() {
            let names = dir_names(fs, &dir).await;
            for name in &names {
                if library.categories.iter().any(|c| c == name) {
                    let root = join_path(&dir, name);
                    if !roots.contains(&root) {
                        roots.push(root);
                    }
                }
            }
            if depth < HUB_DEPTH {
                queue.extend(
                    names
                        .iter()
                        .filter(|name| HUB_DIRS.contains(&name.as_str()))
                        .map(|name| (join_path(&dir, name), depth + 1)),
                );
            }
        }
    }

    info!("[DISCOVER] found {} roots", roots.len());
    if let Some(path) = cache_file {
        if let Err(e) = save_roots(path, &key, &roots) {
            warn!("[DISCOVER] cannot write cache {}: {}", path.display(), e);
        }
    }
    Ok(roots)
}

/// First-level, non-skipped directories under every root, sorted per root.
pub async fn list_series_dirs(
    fs: &dyn RemoteFs,
    roots: &[String],
    skip: &SkipRules,
    max_series: Option<usize>,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for root in roots {
        let mut names: Vec<String> = fs
            .list(root)
            .await?
            .into_iter()
            .filter(|e| e.is_dir && !skip.should_skip(&e.name))
            .map(|e| e.name)
            .collect();
        names.sort();
        out.extend(names.into_iter().map(|name| join_path(root, &name)));
    }
    if let Some(max) = max_series {
        out.truncate(max);
    }
    Ok(out)
}

/// Every directory matching `keyword`, best match first.
///
/// The backend's search index is tried first; without hits, the first-level
/// folders of each root are matched by name. An absolute path
/// (`/storage/电视剧/Show`) is taken literally.
pub async fn find_series_by_keyword(
    fs: &dyn RemoteFs,
    roots: &[String],
    keyword: &str,
    skip: &SkipRules,
) -> Result<Vec<String>> {
    let raw = keyword.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if raw.starts_with('/') && raw[1..].contains('/') {
        return Ok(vec![norm_path(raw)]);
    }

    let mut hits = indexed_matches(fs, roots, raw, skip).await;
    if hits.is_empty() {
        hits = listed_matches(fs, roots, raw, skip).await;
    }

    hits.sort_by(|a, b| {
        similarity(&rank_key(b), raw)
            .total_cmp(&similarity(&rank_key(a), raw))
            .then_with(|| a.cmp(b))
    });
    debug!("keyword '{}' matched {} folders", raw, hits.len());
    Ok(hits)
}

/// Folders the backend's search index finds under the roots.
async fn indexed_matches(fs: &dyn RemoteFs, roots: &[String], keyword: &str, skip: &SkipRules) -> Vec<String> {
    let mut hits: Vec<String> = Vec::new();
    for root in roots {
        let found = match fs.search(root, keyword).await {
            Ok(found) => found,
            Err(e) => {
                debug!("search under {} unavailable: {}", root, e);
                continue;
            }
        };
        for hit in found.iter().filter(|h| h.is_dir && !skip.should_skip(&h.name)) {
            let path = join_path(&hit.parent, &hit.name);
            if !hits.contains(&path) {
                hits.push(path);
            }
        }
    }
    if !hits.is_empty() {
        info!("[SEARCH] index matched {} folders for '{}'", hits.len(), keyword);
    }
    hits
}

/// First-level folders under the roots whose names contain the keyword, or are contained by it.
async fn listed_matches(fs: &dyn RemoteFs, roots: &[String], keyword: &str, skip: &SkipRules) -> Vec<String> {
    let wanted = match_key(keyword);
    let mut hits: Vec<String> = Vec::new();
    for root in roots {
        let entries = match fs.list(root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot list {}: {}", root, e);
                continue;
            }
        };
        for entry in entries.iter().filter(|e| e.is_dir && !skip.should_skip(&e.name)) {
            let key = match_key(&entry.name);
            if key.is_empty() {
                continue;
            }
            if key.contains(&wanted) || wanted.contains(&key) {
                let path = join_path(root, &entry.name);
                if !hits.contains(&path) {
                    hits.push(path);
                }
            }
        }
    }
    hits
}

/// The series folder(s) to process for `keyword`: the best match, or the
/// assistant's pick when several folders match.
pub async fn select_by_keyword(
    fs: &dyn RemoteFs,
    roots: &[String],
    keyword: &str,
    skip: &SkipRules,
    assistant: Option<&dyn ChatAssistant>,
) -> Result<Vec<String>> {
    let hits = find_series_by_keyword(fs, roots, keyword, skip).await?;
    Ok(pick_among(hits, keyword, assistant).await)
}

/// Narrow ranked keyword hits down to one folder.
///
/// The assistant's answer is accepted only when it names one of the hits.
pub async fn pick_among(
    hits: Vec<String>,
    keyword: &str,
    assistant: Option<&dyn ChatAssistant>,
) -> Vec<String> {
    if hits.len() <= 1 {
        return hits;
    }
    if let Some(ai) = assistant {
        if let Some(chosen) = assist::choose_series_path(ai, keyword, &hits).await {
            let chosen = norm_path(&chosen);
            if hits.contains(&chosen) {
                info!("[AI] picked {} for '{}'", chosen, keyword);
                return vec![chosen];
            }
            warn!("[AI] ignored pick outside the matches: {}", chosen);
        }
    }
    hits.into_iter().take(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::overlay::DryRunFs;
    use crate::models::media::{DirEntry, SearchHit};
    use crate::services::local::LocalFs;
    use crate::services::RemoveOutcome;
    use crate::utils::fs::is_within;

    fn layout() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for dir in ["tv/庆余年 第二季", "tv/庆余年", "tv/沉默的真相", "tv/福利合集", "anime/进击的巨人"] {
            std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        std::fs::write(tmp.path().join("tv/readme.txt"), b"x").unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_list_series_dirs() {
        let tmp = layout();
        let local = LocalFs::new(tmp.path());
        let roots = vec!["/tv".to_string(), "/anime".to_string()];
        let dirs = list_series_dirs(&local, &roots, &SkipRules::default(), None)
            .await
            .unwrap();
        assert_eq!(
            dirs,
            vec!["/tv/庆余年", "/tv/庆余年 第二季", "/tv/沉默的真相", "/anime/进击的巨人"]
        );
        let capped = list_series_dirs(&local, &roots, &SkipRules::default(), Some(1))
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_keyword_selection() {
        let tmp = layout();
        let local = LocalFs::new(tmp.path());
        let roots = vec!["/tv".to_string()];
        let skip = SkipRules::default();

        let hits = find_series_by_keyword(&local, &roots, "庆余年", &skip).await.unwrap();
        assert_eq!(hits, vec!["/tv/庆余年", "/tv/庆余年 第二季"]);

        let picked = select_by_keyword(&local, &roots, "庆余年", &skip, None).await.unwrap();
        assert_eq!(picked, vec!["/tv/庆余年"]);

        let direct = find_series_by_keyword(&local, &roots, "/tv/沉默的真相/", &skip)
            .await
            .unwrap();
        assert_eq!(direct, vec!["/tv/沉默的真相"]);
    }

    fn storages() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for dir in [
            "OneDrive-a/电视剧/Show",
            "OneDrive-a/电影",
            "OneDrive-b/媒体/动漫/X",
            "OneDrive-b/媒体/电视剧",
            "OneDrive-c/Media/媒体/电视剧",
            "OneDrive-c/Media/媒体/归档/电视剧",
            "Other/电视剧",
        ] {
            std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        tmp
    }

    #[tokio::test]
    async fn test_discover_tv_roots() {
        let tmp = storages();
        let local = LocalFs::new(tmp.path());
        let roots = discover_tv_roots(&local, &LibraryConfig::default(), None).await.unwrap();
        assert_eq!(
            roots,
            vec![
                "/OneDrive-a/电视剧",
                "/OneDrive-b/媒体/动漫",
                "/OneDrive-b/媒体/电视剧",
                "/OneDrive-c/Media/媒体/电视剧",
            ]
        );

        let library = LibraryConfig {
            root_regex: "(".to_string(),
            categories: vec!["电影".to_string()],
            ..LibraryConfig::default()
        };
        let roots = discover_tv_roots(&local, &library, None).await.unwrap();
        assert_eq!(roots, vec!["/OneDrive-a/电影"]);
    }

    #[tokio::test]
    async fn test_discovered_roots_are_cached_until_stale() {
        let tmp = storages();
        let cache = tmp.path().join("state").join("roots_cache.json");
        let local = LocalFs::new(tmp.path());
        let library = LibraryConfig::default();

        let first = discover_tv_roots(&local, &library, Some(&cache)).await.unwrap();
        assert_eq!(first.len(), 4);
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&cache).unwrap()).unwrap();
        assert_eq!(raw["^OneDrive-|电视剧,动漫"].as_array().unwrap().len(), 4);

        std::fs::remove_dir_all(tmp.path().join("OneDrive-a")).unwrap();
        let cached = discover_tv_roots(&local, &library, Some(&cache)).await.unwrap();
        assert_eq!(cached, first);

        let week_old = std::time::SystemTime::now() - Duration::from_secs(8 * 86_400);
        std::fs::File::options()
            .write(true)
            .open(&cache)
            .unwrap()
            .set_modified(week_old)
            .unwrap();
        let fresh = discover_tv_roots(&local, &library, Some(&cache)).await.unwrap();
        assert_eq!(fresh.len(), 3);
        assert!(!fresh.contains(&"/OneDrive-a/电视剧".to_string()));
    }

    /// Local backend with a canned search index.
    struct Indexed<'a> {
        inner: &'a LocalFs,
        hits: Vec<SearchHit>,
    }

    #[async_trait::async_trait]
    impl RemoteFs for Indexed<'_> {
        async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
            self.inner.list(path).await
        }
        async fn mkdir(&self, path: &str) -> Result<()> {
            self.inner.mkdir(path).await
        }
        async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
            self.inner.rename(path, new_name).await
        }
        async fn move_entries(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
            self.inner.move_entries(src_dir, dst_dir, names).await
        }
        async fn remove(&self, dir: &str, names: &[String]) -> RemoveOutcome {
            self.inner.remove(dir, names).await
        }
        async fn search(&self, parent: &str, _keywords: &str) -> Result<Vec<SearchHit>> {
            Ok(self
                .hits
                .iter()
                .filter(|h| is_within(&h.parent, parent))
                .cloned()
                .collect())
        }
    }

    fn hit(parent: &str, name: &str, is_dir: bool) -> SearchHit {
        SearchHit {
            parent: parent.to_string(),
            name: name.to_string(),
            is_dir,
        }
    }

    #[tokio::test]
    async fn test_keyword_prefers_search_index() {
        let tmp = layout();
        let local = LocalFs::new(tmp.path());
        let roots = vec!["/tv".to_string()];
        let skip = SkipRules::default();

        let indexed = Indexed {
            inner: &local,
            hits: vec![
                hit("/tv/合集", "庆余年 (2019)", true),
                hit("/tv", "庆余年.nfo", false),
                hit("/tv", "庆余年福利", true),
                hit("/movies", "庆余年", true),
            ],
        };
        let hits = find_series_by_keyword(&indexed, &roots, "庆余年", &skip).await.unwrap();
        assert_eq!(hits, vec!["/tv/合集/庆余年 (2019)"]);

        let dry = DryRunFs::new(&indexed);
        let hits = find_series_by_keyword(&dry, &roots, "庆余年", &skip).await.unwrap();
        assert_eq!(hits, vec!["/tv/合集/庆余年 (2019)"]);

        let empty_index = Indexed {
            inner: &local,
            hits: Vec::new(),
        };
        let hits = find_series_by_keyword(&empty_index, &roots, "庆余年", &skip).await.unwrap();
        assert_eq!(hits, vec!["/tv/庆余年", "/tv/庆余年 第二季"]);
    }

    struct Picks(&'static str);

    #[async_trait::async_trait]
    impl ChatAssistant for Picks {
        async fn chat_json(&self, _system: &str, _user: &str) -> Option<serde_json::Value> {
            Some(serde_json::json!({ "path": self.0 }))
        }
    }

    #[tokio::test]
    async fn test_pick_among_validates_assistant_choice() {
        let hits = vec!["/tv/A".to_string(), "/tv/A 第二季".to_string()];
        let ai = Picks("/tv/A 第二季/");
        assert_eq!(pick_among(hits.clone(), "A", Some(&ai)).await, vec!["/tv/A 第二季"]);

        let rogue = Picks("/movies/A");
        assert_eq!(pick_among(hits, "A", Some(&rogue)).await, vec!["/tv/A"]);
    }
}
