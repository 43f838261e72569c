use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use tracing::debug;

use crate::error::{DigestError, Result};

pub const TEMPERATURE: f32 = 0.35;
pub const TOP_P: f32 = 0.9;
pub const MAX_OUTPUT_TOKENS: u32 = 2048;
/// Thinking tokens count against `maxOutputTokens`; spend none on them.
pub const THINKING_BUDGET: u32 = 0;

// Shared client so connections are reused across refreshes
static CLIENT: Lazy<std::result::Result<Client, String>> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| e.to_string())
});

#[derive(Debug, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            thinking_config: Some(ThinkingConfig {
                thinking_budget: THINKING_BUDGET,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Default, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

impl GenerateContentRequest {
    pub fn new(prompt: String, grounding: bool) -> Self {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
            tools: grounding.then(|| {
                vec![Tool {
                    google_search: GoogleSearch::default(),
                }]
            }),
        }
    }

    pub fn grounding_requested(&self) -> bool {
        self.tools.is_some()
    }
}

/// Raw outcome of a completed provider call.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub status: u16,
    pub body: String,
}

impl ProviderReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound seam to the summarization provider.
///
/// Implementations only move bytes: a call that cannot complete is a
/// [`DigestError::Transport`], anything that comes back is a [`ProviderReply`].
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn dispatch(&self, api_key: &str, request: &GenerateContentRequest) -> Result<ProviderReply>;

    fn model(&self) -> &str;
}

pub struct GeminiClient {
    api_base: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        GeminiClient {
            api_base: api_base.into(),
            model: model.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl SummaryProvider for GeminiClient {
    async fn dispatch(&self, api_key: &str, request: &GenerateContentRequest) -> Result<ProviderReply> {
        let client = match &*CLIENT {
            Ok(client) => client,
            Err(e) => return Err(DigestError::Transport(e.clone())),
        };

        let res = client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = res.status().as_u16();
        let body = res.text().await?;
        debug!(status, bytes = body.len(), "provider responded");

        Ok(ProviderReply { status, body })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grounded_request_serializes_in_provider_shape() {
        let req = GenerateContentRequest::new("hello".into(), true);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 2048);
        assert!(value["generationConfig"]["topP"].is_number());
        assert_eq!(value["generationConfig"]["thinkingConfig"], json!({ "thinkingBudget": 0 }));
        assert_eq!(value["tools"], json!([{ "google_search": {} }]));
    }

    #[test]
    fn ungrounded_request_omits_tools() {
        let req = GenerateContentRequest::new("hello".into(), false);
        assert!(!req.grounding_requested());
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn endpoint_keeps_key_out_of_url() {
        let client = GeminiClient::new("https://example.test/v1beta/", "gemini-2.5-flash", Duration::from_secs(5));
        assert_eq!(client.endpoint(), "https://example.test/v1beta/models/gemini-2.5-flash:generateContent");
    }
}
