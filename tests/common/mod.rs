//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use emby_reconciler::core::engine::Reconciler;
use emby_reconciler::core::ledger::UndoLedger;
use emby_reconciler::core::ops::FsOps;
use emby_reconciler::core::resolver::{IdentityCache, MetadataResolver};
use emby_reconciler::models::config::ReconcileConfig;
use emby_reconciler::models::media::{year_of_date, MetadataCandidate, SeriesDetail};
use emby_reconciler::services::{ChatAssistant, MetadataCatalog, RemoteFs};
use emby_reconciler::{Error, Result};

/// In-memory catalog: a search matches every show whose title contains the
/// query (or is contained by it), case-insensitively.
pub struct FakeCatalog {
    shows: Vec<(u64, String, String)>,
    searches: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(shows: &[(u64, &str, &str)]) -> Self {
        Self {
            shows: shows
                .iter()
                .map(|(id, title, date)| (*id, title.to_string(), date.to_string()))
                .collect(),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataCatalog for FakeCatalog {
    async fn search_series(&self, query: &str) -> Result<Vec<MetadataCandidate>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let q = query.to_lowercase();
        Ok(self
            .shows
            .iter()
            .filter(|(_, title, _)| {
                let t = title.to_lowercase();
                t.contains(&q) || q.contains(&t)
            })
            .map(|(id, title, date)| MetadataCandidate {
                id: *id,
                name: title.clone(),
                original_name: title.clone(),
                first_air_year: year_of_date(date),
                popularity: 10.0,
            })
            .collect())
    }

    async fn series_detail(&self, id: u64) -> Result<SeriesDetail> {
        self.shows
            .iter()
            .find(|(show_id, _, _)| *show_id == id)
            .map(|(_, title, date)| SeriesDetail {
                title: title.clone(),
                first_air_date: Some(date.clone()),
            })
            .ok_or_else(|| Error::TmdbRequest(format!("HTTP 404 for {}", id)))
    }
}

/// Assistant that answers every prompt with the same JSON object.
pub struct FakeAssistant {
    reply: Option<Value>,
    calls: AtomicUsize,
}

impl FakeAssistant {
    pub fn new(reply: Option<Value>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatAssistant for FakeAssistant {
    async fn chat_json(&self, _system: &str, _user: &str) -> Option<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

/// Assistant that answers from a script: the first entry whose needle occurs
/// in the user prompt wins, anything else gets no answer.
pub struct ScriptedAssistant {
    script: Vec<(String, Value)>,
    calls: AtomicUsize,
}

impl ScriptedAssistant {
    pub fn new(script: &[(&str, Value)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(needle, reply)| (needle.to_string(), reply.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatAssistant for ScriptedAssistant {
    async fn chat_json(&self, _system: &str, user: &str) -> Option<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
    }
}

/// Assistant that raises `stop` whenever it is consulted, then answers with `reply`.
pub struct StoppingAssistant {
    pub reply: Value,
    pub stop: Arc<AtomicBool>,
}

#[async_trait]
impl ChatAssistant for StoppingAssistant {
    async fn chat_json(&self, _system: &str, _user: &str) -> Option<Value> {
        self.stop.store(true, Ordering::SeqCst);
        Some(self.reply.clone())
    }
}

/// Catalog that raises `stop` on its first search, so the run halts mid-series.
pub struct StoppingCatalog {
    pub inner: FakeCatalog,
    pub stop: Arc<AtomicBool>,
}

#[async_trait]
impl MetadataCatalog for StoppingCatalog {
    async fn search_series(&self, query: &str) -> Result<Vec<MetadataCandidate>> {
        self.stop.store(true, Ordering::SeqCst);
        self.inner.search_series(query).await
    }

    async fn series_detail(&self, id: u64) -> Result<SeriesDetail> {
        self.inner.series_detail(id).await
    }
}

/// Create a file (and its parents) under `root`.
pub fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, rel.as_bytes()).unwrap();
}

/// Every file under `root`, as sorted `/`-separated relative paths.
pub fn files(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    walk(root, root, &mut out, false);
    out.sort();
    out
}

/// Every file and directory under `root`; directories end with `/`.
pub fn tree(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    walk(root, root, &mut out, true);
    out.sort();
    out
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>, with_dirs: bool) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let rel = path
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/");
        if path.is_dir() {
            if with_dirs {
                out.push(format!("{}/", rel));
            }
            walk(root, &path, out, with_dirs);
        } else {
            out.push(rel);
        }
    }
}

/// A reconciler over `fs` rooted at `/tv`. `fs` must already be the
/// dry-run overlay when `dry_run` is set.
pub fn reconciler<'a>(
    fs: &'a dyn RemoteFs,
    catalog: &'a dyn MetadataCatalog,
    settings: &'a ReconcileConfig,
    assistant: Option<&'a dyn ChatAssistant>,
    dry_run: bool,
    undo: Option<UndoLedger>,
    stop: Arc<AtomicBool>,
) -> Reconciler<'a> {
    let ops = FsOps::new(fs, settings.on_conflict, dry_run, undo);
    let resolver = MetadataResolver::new(catalog, None, IdentityCache::default());
    Reconciler::new(settings, &["/tv".to_string()], ops, resolver, assistant, stop).unwrap()
}

/// Like [`reconciler`], with the assistant also consulted during resolution.
pub fn assisted_reconciler<'a>(
    fs: &'a dyn RemoteFs,
    catalog: &'a dyn MetadataCatalog,
    settings: &'a ReconcileConfig,
    assistant: &'a dyn ChatAssistant,
) -> Reconciler<'a> {
    let ops = FsOps::new(fs, settings.on_conflict, false, None);
    let resolver = MetadataResolver::new(catalog, Some(assistant), IdentityCache::default());
    Reconciler::new(settings, &["/tv".to_string()], ops, resolver, Some(assistant), no_stop()).unwrap()
}

pub fn no_stop() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// Sorted owned copy of `paths`, for comparing against [`files`].
pub fn sorted(paths: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    out.sort();
    out
}
