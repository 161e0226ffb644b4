//! External collaborators: remote filesystem, metadata catalog, chat assistant.
//!
//! The reconciliation core only sees the traits below; the HTTP clients, the
//! local-disk backend and the test fakes all plug in behind them.

pub mod ai;
pub mod alist;
pub mod local;
pub mod tmdb;

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::models::media::{DirEntry, MetadataCandidate, SearchHit, SeriesDetail};
use crate::Result;

/// Outcome of a best-effort removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The backend does not offer removal.
    Unsupported,
    Failed(String),
}

/// Remote filesystem with POSIX-style absolute paths.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Direct children of `path`, in backend order.
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>>;

    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Rename the item at `path` to `new_name` within the same parent.
    async fn rename(&self, path: &str, new_name: &str) -> Result<()>;

    /// Move `names` from `src_dir` into `dst_dir`.
    async fn move_entries(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()>;

    /// Remove `names` from `dir`. Never fails the caller.
    async fn remove(&self, dir: &str, names: &[String]) -> RemoveOutcome;

    /// Entries below `parent` whose names match `keywords`, from a server-side
    /// index. Backends without an index find nothing.
    async fn search(&self, _parent: &str, _keywords: &str) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

/// TV metadata catalog.
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    async fn search_series(&self, query: &str) -> Result<Vec<MetadataCandidate>>;

    async fn series_detail(&self, id: u64) -> Result<SeriesDetail>;
}

/// Optional chat model returning JSON objects.
///
/// `None` means "no assistance": transport failures, refusals and unparseable
/// replies all collapse to it.
#[async_trait]
pub trait ChatAssistant: Send + Sync {
    async fn chat_json(&self, system: &str, user: &str) -> Option<serde_json::Value>;
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Minimum spacing between requests of one kind.
pub struct Pacer {
    limiter: Option<DirectLimiter>,
}

impl Pacer {
    /// One request per `interval_secs`; zero or negative disables pacing.
    pub fn new(interval_secs: f64) -> Self {
        let limiter = if interval_secs.is_finite() && interval_secs > 0.0 {
            Quota::with_period(Duration::from_secs_f64(interval_secs))
                .map(|q| RateLimiter::direct(q.allow_burst(NonZeroU32::MIN)))
        } else {
            None
        };
        Self { limiter }
    }

    /// Wait until the next request may be sent.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

/// Exponential backoff delay for a retry attempt, capped at `max_secs`.
pub fn backoff_delay(attempt: u32, base_secs: f64, max_secs: f64) -> Duration {
    let factor = 2f64.powi(attempt.min(30) as i32);
    let secs = (base_secs * factor).min(max_secs).max(0.0);
    Duration::from_secs_f64(secs)
}
