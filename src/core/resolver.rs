//! Series identity resolution against the metadata catalog.
//!
//! Flow per folder: clean the name into a query, pool candidates across a few
//! queries, score them by title similarity with popularity and year
//! adjustments, let the assistant break close calls, then fetch the winner's
//! details for the authoritative title and year. Results are cached by the
//! cleaned query for the whole run.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::assist;
use crate::core::parser::{extract_year_hint, parse_season};
use crate::core::query::{clean_series_query, is_bad_query};
use crate::models::media::{year_of_date, MetadataCandidate, ResolvedSeries, SeriesContext};
use crate::services::{ChatAssistant, MetadataCatalog};
use crate::utils::chinese::similarity;
use crate::Result;

/// Results kept per query.
const RESULTS_PER_QUERY: usize = 20;
/// Stop issuing queries once the pool holds this many candidates.
const POOL_TARGET: usize = 25;
/// Candidates scored.
const SCORED_LIMIT: usize = 20;
/// Assistant-suggested queries tried when the pool is empty.
const AI_RETRY_BUDGET: usize = 5;
/// Below this score the winner is considered unsure.
const CONFIDENCE_FLOOR: f64 = 0.72;
/// Top-two gap under which the race is considered close.
const CLOSENESS: f64 = 0.03;
const POPULARITY_BONUS_CAP: f64 = 0.08;
const YEAR_MATCH_BONUS: f64 = 0.12;
const YEAR_MISMATCH_PENALTY: f64 = 0.04;

/// One cached identity, stored as `{"tv_id", "name", "year"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedIdentity {
    pub tv_id: u64,
    pub name: String,
    pub year: Option<i32>,
}

/// Run-wide identity cache keyed by cleaned query.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: BTreeMap<String, CachedIdentity>,
}

impl IdentityCache {
    /// Load a cache file; a missing or unreadable file starts an empty cache.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => Self { entries },
            Err(e) => {
                warn!("[TMDB] ignoring unreadable cache {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the cache as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CachedIdentity> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, identity: CachedIdentity) {
        self.entries.insert(key, identity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves folder names to catalog identities.
pub struct MetadataResolver<'a> {
    catalog: &'a dyn MetadataCatalog,
    assistant: Option<&'a dyn ChatAssistant>,
    cache: IdentityCache,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(
        catalog: &'a dyn MetadataCatalog,
        assistant: Option<&'a dyn ChatAssistant>,
        cache: IdentityCache,
    ) -> Self {
        Self {
            catalog,
            assistant,
            cache,
        }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Resolve a series folder name, or `None` when nothing acceptable matches.
    ///
    /// Catalog transport errors propagate; assistant silence never does.
    pub async fn resolve(
        &mut self,
        folder_name: &str,
        context: &SeriesContext,
    ) -> Result<Option<ResolvedSeries>> {
        let season_hint = parse_season(folder_name);
        let key = clean_series_query(folder_name);

        if let Some(hit) = self.cache.get(&key) {
            debug!("[TMDB] cache hit '{}' -> {}", key, hit.tv_id);
            return Ok(Some(ResolvedSeries {
                id: hit.tv_id,
                title: hit.name.clone(),
                year: hit.year,
                season_hint,
            }));
        }

        let year_hint = context.year_hint.or_else(|| extract_year_hint(folder_name));
        let english_title = context
            .english_title
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let mut primary = key.clone();
        if primary.chars().count() < 2 {
            if let Some(ai) = self.assistant {
                if let Some(q) = assist::extract_query(ai, folder_name).await {
                    info!("[AI] extracted query: {} <- {}", q, folder_name);
                    primary = q;
                }
            }
        }

        let mut queries: Vec<String> = Vec::new();
        let push_query = |queries: &mut Vec<String>, q: &str| {
            let q = q.trim();
            if !q.is_empty() && !queries.iter().any(|existing| existing == q) {
                queries.push(q.to_string());
            }
        };
        if !is_bad_query(&primary) {
            push_query(&mut queries, &primary);
        }
        if !english_title.is_empty()
            && english_title.to_lowercase() != primary.to_lowercase()
            && english_title.chars().any(|c| c.is_ascii_alphabetic())
            && !is_bad_query(&english_title)
        {
            push_query(&mut queries, &english_title);
        }
        for q in &context.extra_queries {
            if !is_bad_query(q) {
                push_query(&mut queries, q);
            }
        }
        if queries.is_empty() {
            debug!("[TMDB] no usable query for '{}'", folder_name);
            return Ok(None);
        }

        let mut pool: Vec<MetadataCandidate> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        for q in &queries {
            let added = self.search_into(q, &mut pool, &mut seen).await?;
            debug!("[TMDB] search '{}' -> {} new", q, added);
            if pool.len() >= POOL_TARGET {
                break;
            }
        }

        if pool.is_empty() {
            if let Some(ai) = self.assistant {
                let mut alternatives = assist::extract_queries(ai, folder_name).await;
                if let Some(q) = assist::extract_query(ai, folder_name).await {
                    alternatives.push(q);
                }
                let mut tried = 0;
                for alt in alternatives {
                    let alt = alt.trim().to_string();
                    if alt.is_empty() || queries.contains(&alt) || is_bad_query(&alt) {
                        continue;
                    }
                    info!("[AI] retry search with: {}", alt);
                    self.search_into(&alt, &mut pool, &mut seen).await?;
                    queries.push(alt);
                    tried += 1;
                    if !pool.is_empty() || tried >= AI_RETRY_BUDGET {
                        break;
                    }
                }
            }
        }

        if pool.is_empty() {
            return Ok(None);
        }

        let mut scored: Vec<(f64, &MetadataCandidate)> = pool
            .iter()
            .take(SCORED_LIMIT)
            .map(|c| (score_candidate(c, &queries, year_hint), c))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut best = scored[0].1;
        let unsure = scored[0].0 < CONFIDENCE_FLOOR
            || (scored.len() >= 2 && scored[0].0 - scored[1].0 < CLOSENESS);
        if unsure {
            if let Some(ai) = self.assistant {
                let mut hints = context.clone();
                hints.year_hint = year_hint;
                if !english_title.is_empty() {
                    hints.english_title = Some(english_title.clone());
                }
                let ranked: Vec<&MetadataCandidate> = scored.iter().map(|(_, c)| *c).collect();
                let query = if primary.is_empty() { &queries[0] } else { &primary };
                if let Some(id) =
                    assist::choose_candidate(ai, folder_name, query, &ranked, &hints).await
                {
                    if let Some(picked) = ranked.iter().find(|c| c.id == id) {
                        info!("[AI] chose id {} for: {}", id, folder_name);
                        best = *picked;
                    }
                }
            }
        }

        let detail = self.catalog.series_detail(best.id).await?;
        let title = if detail.title.trim().is_empty() {
            best.name.clone()
        } else {
            detail.title.trim().to_string()
        };
        let year = detail
            .first_air_date
            .as_deref()
            .and_then(year_of_date)
            .or(best.first_air_year);

        info!("[TMDB] {} -> {} ({:?}) id={}", folder_name, title, year, best.id);
        self.cache.insert(
            key,
            CachedIdentity {
                tv_id: best.id,
                name: title.clone(),
                year,
            },
        );

        Ok(Some(ResolvedSeries {
            id: best.id,
            title,
            year,
            season_hint,
        }))
    }

    /// Search one query and append unseen candidates; returns how many were added.
    async fn search_into(
        &self,
        query: &str,
        pool: &mut Vec<MetadataCandidate>,
        seen: &mut HashSet<u64>,
    ) -> Result<usize> {
        let results = self.catalog.search_series(query).await?;
        let before = pool.len();
        for candidate in results.into_iter().take(RESULTS_PER_QUERY) {
            if seen.insert(candidate.id) {
                pool.push(candidate);
            }
        }
        Ok(pool.len() - before)
    }
}

/// Best title similarity over all queries plus popularity and year adjustments.
pub fn score_candidate(candidate: &MetadataCandidate, queries: &[String], year_hint: Option<i32>) -> f64 {
    let sim = queries
        .iter()
        .flat_map(|q| {
            [
                similarity(q, &candidate.name),
                similarity(q, &candidate.original_name),
            ]
        })
        .fold(0.0, f64::max);

    let popularity = (candidate.popularity.max(0.0) / 10_000.0).min(POPULARITY_BONUS_CAP);
    let year_adjust = match (year_hint, candidate.first_air_year) {
        (Some(hint), Some(year)) if hint == year => YEAR_MATCH_BONUS,
        (Some(_), Some(_)) => -YEAR_MISMATCH_PENALTY,
        _ => 0.0,
    };
    sim + popularity + year_adjust
}
