//! AList API client.
//!
//! All filesystem calls are `POST /api/fs/*` with a JSON envelope
//! `{code, message, data}`. Reads and writes are paced separately and
//! transient failures are retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{backoff_delay, Pacer, RemoveOutcome, RemoteFs};
use crate::models::config::AlistConfig;
use crate::models::media::{DirEntry, SearchHit};
use crate::utils::fs::norm_path;
use crate::{Error, Result};

const PER_PAGE: u64 = 200;
const MAX_PAGES: u64 = 200;
const SEARCH_PER_PAGE: u64 = 100;
/// `scope` value restricting a search to folders.
const SEARCH_FOLDERS: u8 = 1;

/// Request class, used to pick the pacer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Read,
    Write,
}

/// AList response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    content: Option<Vec<ListItem>>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_dir: bool,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    content: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    parent: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_dir: bool,
}

/// AList API client.
pub struct AlistClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    otp_code: Option<String>,
    token: Mutex<Option<String>>,
    retries: u32,
    retry_base: f64,
    retry_max: f64,
    refresh: bool,
    client: reqwest::Client,
    read_pacer: Pacer,
    write_pacer: Pacer,
}

impl AlistClient {
    /// Create a client. Either a token or a username/password pair is required.
    pub fn new(config: &AlistConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::AlistUrlMissing);
        }
        let token = config.token.clone().filter(|t| !t.trim().is_empty());
        let has_login = config.username.as_deref().is_some_and(|u| !u.is_empty())
            && config.password.as_deref().is_some_and(|p| !p.is_empty());
        if token.is_none() && !has_login {
            return Err(Error::AlistCredentialsMissing);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            otp_code: config.otp_code.clone().filter(|o| !o.is_empty()),
            token: Mutex::new(token),
            retries: config.retries.max(1),
            retry_base: config.retry_base,
            retry_max: config.retry_max,
            refresh: config.refresh,
            client,
            read_pacer: Pacer::new(config.read_interval),
            write_pacer: Pacer::new(config.write_interval),
        })
    }

    /// Current token, logging in first when only credentials were given.
    async fn token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(Error::AlistCredentialsMissing);
        };
        let mut payload = json!({ "username": username, "password": password });
        if let Some(otp) = &self.otp_code {
            payload["otp_code"] = json!(otp);
        }

        self.read_pacer.wait().await;
        let resp = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope = resp.json().await?;
        if envelope.code != 200 {
            return Err(Error::AlistLoginFailed(envelope.message));
        }
        let token = envelope
            .data
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::AlistLoginFailed("response carried no token".to_string()))?
            .to_string();
        debug!("[ALIST] logged in as {}", username);
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn post_once(&self, path: &str, payload: &Value, token: &str) -> Result<Value> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", token)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope = resp.json().await?;
        if envelope.code == 200 {
            return Ok(envelope.data);
        }
        let target = payload
            .get("path")
            .or_else(|| payload.get("dir"))
            .or_else(|| payload.get("src_dir"))
            .and_then(Value::as_str)
            .unwrap_or(path)
            .to_string();
        if envelope.message.to_lowercase().contains("not found") {
            return Err(Error::PathNotFound(target));
        }
        Err(Error::AlistApi {
            path: target,
            code: envelope.code,
            message: envelope.message,
        })
    }

    /// POST with pacing and retries on transient failures.
    async fn post(&self, path: &str, payload: Value, kind: Kind) -> Result<Value> {
        let token = self.token().await?;
        let pacer = match kind {
            Kind::Read => &self.read_pacer,
            Kind::Write => &self.write_pacer,
        };

        let mut attempt = 0;
        loop {
            pacer.wait().await;
            match self.post_once(path, &payload, &token).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() && attempt + 1 < self.retries => {
                    let delay = backoff_delay(attempt, self.retry_base, self.retry_max);
                    warn!(
                        "[ALIST] {} failed ({}), retry {}/{} in {:.1}s",
                        path,
                        e,
                        attempt + 1,
                        self.retries - 1,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The user the token belongs to.
    pub async fn whoami(&self) -> Result<String> {
        let token = self.token().await?;
        self.read_pacer.wait().await;
        let resp = self
            .client
            .get(format!("{}/api/me", self.base_url))
            .header("Authorization", &token)
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope = resp.json().await?;
        if envelope.code != 200 {
            return Err(Error::AlistApi {
                path: "/api/me".to_string(),
                code: envelope.code,
                message: envelope.message,
            });
        }
        Ok(envelope
            .data
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl RemoteFs for AlistClient {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = norm_path(path);
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let data = self
                .post(
                    "/api/fs/list",
                    json!({
                        "path": path,
                        "password": "",
                        "page": page,
                        "per_page": PER_PAGE,
                        "refresh": self.refresh && page == 1,
                    }),
                    Kind::Read,
                )
                .await?;
            let listing: ListPage = serde_json::from_value(data)?;
            let content = listing.content.unwrap_or_default();
            if content.is_empty() {
                break;
            }
            out.extend(
                content
                    .into_iter()
                    .filter(|item| !item.name.is_empty())
                    .map(|item| DirEntry {
                        name: item.name,
                        is_dir: item.is_dir,
                    }),
            );
            if listing.total > 0 && out.len() as u64 >= listing.total {
                break;
            }
        }
        Ok(out)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.post("/api/fs/mkdir", json!({ "path": norm_path(path) }), Kind::Write)
            .await
            .map(|_| ())
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
        self.post(
            "/api/fs/rename",
            json!({ "path": norm_path(path), "name": new_name }),
            Kind::Write,
        )
        .await
        .map(|_| ())
    }

    async fn move_entries(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.post(
            "/api/fs/move",
            json!({
                "src_dir": norm_path(src_dir),
                "dst_dir": norm_path(dst_dir),
                "names": names,
            }),
            Kind::Write,
        )
        .await
        .map(|_| ())
    }

    async fn remove(&self, dir: &str, names: &[String]) -> RemoveOutcome {
        if names.is_empty() {
            return RemoveOutcome::Removed;
        }
        let payload = json!({ "dir": norm_path(dir), "names": names });
        match self.post("/api/fs/remove", payload, Kind::Write).await {
            Ok(_) => RemoveOutcome::Removed,
            Err(Error::Http(e))
                if e.status().is_some_and(|s| s.as_u16() == 404 || s.as_u16() == 405) =>
            {
                RemoveOutcome::Unsupported
            }
            Err(e) => RemoveOutcome::Failed(e.to_string()),
        }
    }

    /// `/api/fs/search`; needs the AList search index, and returns nothing without it.
    async fn search(&self, parent: &str, keywords: &str) -> Result<Vec<SearchHit>> {
        let parent = norm_path(parent);
        let data = self
            .post(
                "/api/fs/search",
                json!({
                    "parent": parent,
                    "keywords": keywords,
                    "scope": SEARCH_FOLDERS,
                    "page": 1,
                    "per_page": SEARCH_PER_PAGE,
                    "password": "",
                }),
                Kind::Read,
            )
            .await?;
        let page: SearchPage = serde_json::from_value(data)?;
        let hits = search_hits(page, &parent);
        debug!("[ALIST] search '{}' under {}: {} hits", keywords, parent, hits.len());
        Ok(hits)
    }
}

fn search_hits(page: SearchPage, parent: &str) -> Vec<SearchHit> {
    page.content
        .unwrap_or_default()
        .into_iter()
        .filter(|item| !item.name.is_empty())
        .map(|item| SearchHit {
            parent: if item.parent.trim().is_empty() {
                parent.to_string()
            } else {
                norm_path(&item.parent)
            },
            name: item.name,
            is_dir: item.is_dir,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlistConfig {
        AlistConfig {
            base_url: "http://127.0.0.1:5244/".to_string(),
            token: Some("alist-abc".to_string()),
            ..AlistConfig::default()
        }
    }

    #[test]
    fn test_requires_url_and_credentials() {
        let mut cfg = config();
        cfg.base_url = String::new();
        assert!(matches!(AlistClient::new(&cfg), Err(Error::AlistUrlMissing)));

        let mut cfg = config();
        cfg.token = None;
        assert!(matches!(
            AlistClient::new(&cfg),
            Err(Error::AlistCredentialsMissing)
        ));

        cfg.username = Some("admin".to_string());
        cfg.password = Some("secret".to_string());
        assert!(AlistClient::new(&cfg).is_ok());
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = AlistClient::new(&config()).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:5244");
        assert_eq!(client.retries, 5);
    }

    #[test]
    fn test_list_page_parsing() {
        let data = json!({
            "content": [{"name": "S01", "is_dir": true}, {"name": "a.mkv", "is_dir": false, "size": 10}],
            "total": 2,
        });
        let page: ListPage = serde_json::from_value(data).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.content.unwrap().len(), 2);

        // AList returns `content: null` for empty folders.
        let empty: ListPage = serde_json::from_value(json!({"content": null, "total": 0})).unwrap();
        assert!(empty.content.is_none());
    }

    #[test]
    fn test_search_page_parsing() {
        let data = json!({
            "content": [
                {"parent": "/od/电视剧/", "name": "庆余年", "is_dir": true, "size": 0},
                {"parent": "", "name": "庆余年.nfo", "is_dir": false},
                {"parent": "/od/电视剧", "name": "", "is_dir": true},
            ],
            "total": 3,
        });
        let page: SearchPage = serde_json::from_value(data).unwrap();
        let hits = search_hits(page, "/od/电视剧");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].parent, "/od/电视剧");
        assert!(hits[0].is_dir);
        assert_eq!(hits[1].parent, "/od/电视剧");

        let empty: SearchPage = serde_json::from_value(json!({"content": null, "total": 0})).unwrap();
        assert!(search_hits(empty, "/").is_empty());
    }

    #[tokio::test]
    async fn test_token_is_reused() {
        let client = AlistClient::new(&config()).unwrap();
        assert_eq!(client.token().await.unwrap(), "alist-abc");
    }
}
