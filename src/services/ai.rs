//! OpenAI-compatible chat client.
//!
//! Any gateway speaking `/v1/chat/completions` works (OpenAI, DeepSeek,
//! one-api style relays, local servers). Replies are requested in JSON mode
//! and the first `{...}` span of the content is parsed, so gateways that
//! ignore `response_format` still work when the model wraps its answer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ChatAssistant, Pacer};
use crate::models::config::AiConfig;
use crate::{Error, Result};

const MAX_TOKENS: u32 = 400;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    /// 0 keeps answers stable across runs
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions endpoint for a base URL.
pub fn completions_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

fn models_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/models", base)
    } else {
        format!("{}/v1/models", base)
    }
}

/// Parse the first `{...}` span of a model reply.
pub fn parse_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// OpenAI-compatible chat client.
pub struct AiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    pacer: Pacer,
}

impl AiClient {
    /// Create a client; fails when no API key is configured.
    pub fn new(config: &AiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig("AI API key not configured".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .build()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            client,
            pacer: Pacer::new(config.interval),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the endpoint answers an authorized model listing.
    pub async fn health_check(&self) -> Result<bool> {
        let url = models_url(&self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Option<String>> {
        self.pacer.wait().await;
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .client
            .post(completions_url(&self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::other(format!("chat endpoint returned HTTP {}", status.as_u16())));
        }
        let body: ChatResponse = resp.json().await?;
        Ok(body.choices.into_iter().next().and_then(|c| c.message.content))
    }
}

#[async_trait]
impl ChatAssistant for AiClient {
    async fn chat_json(&self, system: &str, user: &str) -> Option<Value> {
        match self.complete(system, user).await {
            Ok(Some(content)) => {
                let parsed = parse_json_object(&content);
                if parsed.is_none() {
                    debug!("[AI] unparseable reply: {}", content.chars().take(200).collect::<String>());
                }
                parsed
            }
            Ok(None) => None,
            Err(e) => {
                warn!("[AI] request failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completions_url() {
        assert_eq!(
            completions_url("https://api.openai.com"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("https://relay.example.com/v1/"),
            "https://relay.example.com/v1/chat/completions"
        );
        assert_eq!(models_url("http://127.0.0.1:8000/v1"), "http://127.0.0.1:8000/v1/models");
    }

    #[test]
    fn test_parse_json_object() {
        assert_eq!(
            parse_json_object("```json\n{\"query\": \"鹿鼎记\"}\n```"),
            Some(json!({"query": "鹿鼎记"}))
        );
        assert_eq!(parse_json_object("no json here"), None);
        assert_eq!(parse_json_object("} {"), None);
        assert_eq!(parse_json_object("{broken"), None);
    }

    #[test]
    fn test_requires_key() {
        let config = AiConfig::default();
        assert!(AiClient::new(&config).is_err());
        let config = AiConfig {
            api_key: Some("sk-test".to_string()),
            ..AiConfig::default()
        };
        assert_eq!(AiClient::new(&config).unwrap().model(), "gpt-4o-mini");
    }
}
