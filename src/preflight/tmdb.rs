//! TMDB API preflight check.

use super::CheckResult;
use crate::models::config::TmdbConfig;
use crate::services::tmdb::TmdbClient;

/// Check if TMDB API is accessible.
pub async fn check(config: &TmdbConfig) -> CheckResult {
    match TmdbClient::new(config) {
        Ok(client) => match client.verify_api_key().await {
            Ok(true) => CheckResult::ok("TMDB API", &format!("connected ({})", client.base_url())),
            Ok(false) => CheckResult::fail(
                "TMDB API",
                "invalid API key or unreachable",
                "Check TMDB_KEY, or set TMDB_API_BASE to a reachable proxy",
            ),
            Err(_) => CheckResult::fail(
                "TMDB API",
                "connection failed",
                "Check your network connection",
            ),
        },
        Err(_) => CheckResult::fail(
            "TMDB API",
            "API key not configured",
            "Set TMDB_KEY environment variable",
        ),
    }
}
