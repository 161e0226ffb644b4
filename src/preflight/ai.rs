//! AI endpoint preflight check.

use super::CheckResult;
use crate::models::config::AiConfig;
use crate::services::ai::AiClient;

/// Check if the chat endpoint answers.
pub async fn check(config: &AiConfig) -> CheckResult {
    let client = match AiClient::new(config) {
        Ok(client) => client,
        Err(_) => {
            return CheckResult::fail(
                "AI",
                "API key not configured",
                "Set AI_API_KEY, or pass --no-ai",
            )
        }
    };

    match client.health_check().await {
        Ok(true) => CheckResult::ok("AI", &format!("reachable (model: {})", client.model())),
        Ok(false) | Err(_) => CheckResult::fail(
            "AI",
            &format!("{} not reachable", config.base_url),
            "Check AI_BASE_URL and AI_API_KEY, or pass --no-ai",
        ),
    }
}
