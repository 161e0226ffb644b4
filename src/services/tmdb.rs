//! TMDB API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{MetadataCatalog, Pacer};
use crate::models::config::TmdbConfig;
use crate::models::media::{year_of_date, MetadataCandidate, SeriesDetail};
use crate::{Error, Result};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TV show search result.
#[derive(Debug, Deserialize)]
struct TvSearchResult {
    #[serde(default)]
    results: Vec<TvSearchItem>,
}

/// TV show search item.
#[derive(Debug, Deserialize)]
struct TvSearchItem {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    original_name: String,
    first_air_date: Option<String>,
    #[serde(default)]
    popularity: f64,
}

/// TV show details.
#[derive(Debug, Deserialize)]
struct TvDetails {
    #[serde(default)]
    name: String,
    #[serde(default)]
    original_name: String,
    first_air_date: Option<String>,
}

/// Resolve the API base: explicit `/3` or `/get` kept, official hosts get
/// `/3`, reverse proxies get `/get`.
pub fn resolve_base_url(configured: Option<&str>) -> String {
    let base = match configured.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => base.trim_end_matches('/'),
        None => return TMDB_BASE_URL.to_string(),
    };
    if base.ends_with("/3") || base.ends_with("/get") {
        base.to_string()
    } else if base.to_lowercase().contains("themoviedb.org") {
        format!("{}/3", base)
    } else {
        format!("{}/get", base)
    }
}

/// TMDB API client.
pub struct TmdbClient {
    api_key: String,
    language: String,
    base_url: String,
    /// Bearer tokens (v4) start with "eyJ" (base64 encoded JWT header).
    use_bearer: bool,
    client: reqwest::Client,
    pacer: Pacer,
}

impl TmdbClient {
    /// Create a new TMDB client.
    pub fn new(config: &TmdbConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::TmdbApiKeyMissing)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .build()?;
        Ok(Self {
            use_bearer: api_key.starts_with("eyJ"),
            api_key,
            language: config.language.clone(),
            base_url: resolve_base_url(config.base_url.as_deref()),
            client,
            pacer: Pacer::new(config.interval),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with proper authentication.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        if self.use_bearer {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        } else {
            request
        }
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, extra_params: &str) -> String {
        if self.use_bearer {
            format!(
                "{}/{}?language={}{}",
                self.base_url, path, self.language, extra_params
            )
        } else {
            format!(
                "{}/{}?api_key={}&language={}{}",
                self.base_url,
                path,
                urlencoding::encode(&self.api_key),
                self.language,
                extra_params
            )
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.pacer.wait().await;
        let resp = self.build_request(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::TmdbRequest(format!("HTTP {}", status.as_u16())));
        }
        Ok(resp.json().await?)
    }

    /// Verify API key is valid.
    pub async fn verify_api_key(&self) -> Result<bool> {
        let url = if self.use_bearer {
            format!("{}/authentication", self.base_url)
        } else {
            format!(
                "{}/authentication?api_key={}",
                self.base_url,
                urlencoding::encode(&self.api_key)
            )
        };

        match self.build_request(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl MetadataCatalog for TmdbClient {
    async fn search_series(&self, query: &str) -> Result<Vec<MetadataCandidate>> {
        let url = self.build_url(
            "search/tv",
            &format!("&query={}", urlencoding::encode(query)),
        );
        let resp: TvSearchResult = self.get_json(&url).await?;
        debug!("[TMDB] '{}' -> {} results", query, resp.results.len());
        Ok(resp
            .results
            .into_iter()
            .map(|item| MetadataCandidate {
                id: item.id,
                first_air_year: item.first_air_date.as_deref().and_then(year_of_date),
                name: item.name,
                original_name: item.original_name,
                popularity: item.popularity,
            })
            .collect())
    }

    async fn series_detail(&self, id: u64) -> Result<SeriesDetail> {
        let url = self.build_url(&format!("tv/{}", id), "");
        let details: TvDetails = self.get_json(&url).await?;
        let title = if details.name.trim().is_empty() {
            details.original_name
        } else {
            details.name
        };
        Ok(SeriesDetail {
            title,
            first_air_date: details.first_air_date.filter(|d| !d.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(key: &str, base: Option<&str>) -> TmdbClient {
        let config = TmdbConfig {
            api_key: Some(key.to_string()),
            base_url: base.map(str::to_string),
            ..TmdbConfig::default()
        };
        TmdbClient::new(&config).unwrap()
    }

    #[test]
    fn test_resolve_base_url() {
        assert_eq!(resolve_base_url(None), "https://api.themoviedb.org/3");
        assert_eq!(resolve_base_url(Some("  ")), "https://api.themoviedb.org/3");
        assert_eq!(
            resolve_base_url(Some("https://api.themoviedb.org/")),
            "https://api.themoviedb.org/3"
        );
        assert_eq!(
            resolve_base_url(Some("https://tmdb.example.cn")),
            "https://tmdb.example.cn/get"
        );
        assert_eq!(
            resolve_base_url(Some("https://tmdb.example.cn/get/")),
            "https://tmdb.example.cn/get"
        );
        assert_eq!(
            resolve_base_url(Some("https://mirror.example.cn/3")),
            "https://mirror.example.cn/3"
        );
    }

    #[test]
    fn test_build_url_v3_and_bearer() {
        let v3 = client("abc123", None);
        assert!(!v3.use_bearer);
        assert_eq!(
            v3.build_url("tv/42", ""),
            "https://api.themoviedb.org/3/tv/42?api_key=abc123&language=zh-CN"
        );

        let v4 = client("eyJhbGciOi", Some("https://proxy.example.cn"));
        assert!(v4.use_bearer);
        assert_eq!(
            v4.build_url("search/tv", "&query=x"),
            "https://proxy.example.cn/get/search/tv?language=zh-CN&query=x"
        );
    }

    #[test]
    fn test_missing_key() {
        let config = TmdbConfig::default();
        assert!(matches!(
            TmdbClient::new(&config),
            Err(Error::TmdbApiKeyMissing)
        ));
    }

    #[test]
    fn test_search_payload_parsing() {
        let body = r#"{"results":[{"id":1,"name":"鹿鼎记","original_name":"鹿鼎記","first_air_date":"1998-02-02","popularity":3.5},{"id":2,"first_air_date":""}]}"#;
        let parsed: TvSearchResult = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].name, "鹿鼎记");
        assert_eq!(parsed.results[1].popularity, 0.0);
    }
}
