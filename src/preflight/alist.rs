//! AList preflight checks.

use super::CheckResult;
use crate::models::config::AlistConfig;
use crate::services::alist::AlistClient;
use crate::services::RemoteFs;

/// Check that AList answers, accepts our credentials and serves every root.
pub async fn check(config: &AlistConfig, roots: &[String]) -> Vec<CheckResult> {
    let client = match AlistClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            return vec![CheckResult::fail(
                "AList",
                &e.to_string(),
                "Set ALIST_URL and ALIST_TOKEN (or ALIST_USER + ALIST_PASS)",
            )]
        }
    };

    let mut results = Vec::new();
    match client.whoami().await {
        Ok(user) => results.push(CheckResult::ok(
            "AList",
            &format!("connected to {} as {}", config.base_url, user),
        )),
        Err(e) => {
            results.push(CheckResult::fail(
                "AList",
                &e.to_string(),
                "Check ALIST_URL and the credentials",
            ));
            return results;
        }
    }

    for root in roots {
        let name = format!("Root {}", root);
        match client.list(root).await {
            Ok(entries) => results.push(CheckResult::ok(
                &name,
                &format!("{} entries", entries.len()),
            )),
            Err(e) => results.push(CheckResult::fail(
                &name,
                &e.to_string(),
                "Check the path exists and the user can read it",
            )),
        }
    }
    results
}
