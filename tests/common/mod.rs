#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use news_digest::config::{Config, DigestSettings};
use news_digest::digest::DigestService;
use news_digest::error::Result;
use news_digest::llm::{GenerateContentRequest, ProviderReply, SummaryProvider};
use news_digest::AppState;

/// Provider double that replays queued replies and counts calls.
/// Panics when called more often than replies were queued.
pub struct MockProvider {
    calls: AtomicUsize,
    replies: Mutex<VecDeque<Result<ProviderReply>>>,
    grounding_flags: Mutex<Vec<bool>>,
    delay: Duration,
}

impl MockProvider {
    pub fn new(replies: Vec<Result<ProviderReply>>) -> Arc<Self> {
        Self::with_delay(replies, Duration::ZERO)
    }

    pub fn with_delay(replies: Vec<Result<ProviderReply>>, delay: Duration) -> Arc<Self> {
        Arc::new(MockProvider {
            calls: AtomicUsize::new(0),
            replies: Mutex::new(replies.into()),
            grounding_flags: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn grounding_flags(&self) -> Vec<bool> {
        self.grounding_flags.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummaryProvider for MockProvider {
    async fn dispatch(&self, api_key: &str, request: &GenerateContentRequest) -> Result<ProviderReply> {
        assert_eq!(api_key, "test-key");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.grounding_flags.lock().unwrap().push(request.grounding_requested());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("provider invoked more often than expected")
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

pub fn settings() -> DigestSettings {
    DigestSettings {
        api_key: Some("test-key".to_string()),
        cache_ttl: Duration::from_secs(2 * 60 * 60),
        grounding: true,
        upstream_timeout: Duration::from_secs(5),
        ..DigestSettings::default()
    }
}

pub fn service(provider: Arc<MockProvider>, settings: DigestSettings) -> DigestService {
    DigestService::new(provider, settings)
}

pub fn app_state(provider: Arc<MockProvider>, settings: DigestSettings) -> AppState {
    let config = Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        digest: settings.clone(),
        cache_control: "no-store, max-age=0".to_string(),
    };
    AppState {
        config: Arc::new(config),
        digest: Arc::new(DigestService::new(provider, settings)),
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
}

pub fn chunk(uri: &str, title: &str) -> Value {
    json!({ "web": { "uri": uri, "title": title } })
}

pub fn body_with(text: &str, chunks: Vec<Value>, queries: Vec<&str>) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP",
            "groundingMetadata": {
                "groundingChunks": chunks,
                "webSearchQueries": queries,
                "searchEntryPoint": { "renderedContent": "<div class=\"container\">chips</div>" }
            }
        }]
    })
    .to_string()
}

pub fn ok(body: String) -> Result<ProviderReply> {
    Ok(ProviderReply { status: 200, body })
}

pub fn ok_text(text: &str) -> Result<ProviderReply> {
    ok(body_with(
        text,
        vec![chunk("https://news.test/a", "A")],
        vec!["오늘 국제 뉴스"],
    ))
}
