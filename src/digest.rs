use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DigestSettings;
use crate::error::{DigestError, Result};
use crate::extract::{self, Source};
use crate::llm::{GenerateContentRequest, SummaryProvider};
use crate::prompt::DigestPrompt;

/// The last successfully generated digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDigest {
    pub summary: String,
    /// `None` when grounding was not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_queries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_entry_point_html: Option<String>,
    pub generated_at: DateTime<Utc>,
    #[serde(skip)]
    pub ttl: TimeDelta,
    pub model: String,
}

impl CachedDigest {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.generated_at < self.ttl
    }
}

type Refresh = Shared<BoxFuture<'static, Result<CachedDigest>>>;

/// Produces news digests, serving a single in-memory copy until it expires.
pub struct DigestService {
    inner: Arc<Generator>,
    // The refresh currently running, if any. Every caller that misses the
    // cache while it runs awaits this same future and gets its outcome.
    in_flight: Mutex<Option<Refresh>>,
}

struct Generator {
    provider: Arc<dyn SummaryProvider>,
    settings: DigestSettings,
    cache: RwLock<Option<CachedDigest>>,
}

impl DigestService {
    pub fn new(provider: Arc<dyn SummaryProvider>, settings: DigestSettings) -> Self {
        DigestService {
            inner: Arc::new(Generator {
                provider,
                settings,
                cache: RwLock::new(None),
            }),
            in_flight: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.inner.ttl()
    }

    /// Returns the cached digest if it is still fresh at `now`.
    pub fn cached(&self, now: DateTime<Utc>) -> Option<CachedDigest> {
        let cache = self.inner.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.as_ref().filter(|d| d.is_fresh(now)).cloned()
    }

    pub async fn get_digest(&self, now: DateTime<Utc>) -> Result<CachedDigest> {
        if let Some(digest) = self.cached(now) {
            debug!(generated_at = %digest.generated_at, "digest cache hit");
            return Ok(digest);
        }

        let refresh = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(running) => {
                    debug!("joining in-flight digest refresh");
                    running.clone()
                }
                None => {
                    // A refresh may have finished since the first check.
                    if let Some(digest) = self.cached(now) {
                        return Ok(digest);
                    }
                    info!("digest cache miss, generating");
                    let inner = Arc::clone(&self.inner);
                    let refresh = async move { inner.refresh(now).await }.boxed().shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        let outcome = refresh.clone().await;

        {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|running| running.ptr_eq(&refresh)) {
                *slot = None;
            }
        }

        outcome
    }
}

impl Generator {
    fn ttl(&self) -> TimeDelta {
        TimeDelta::from_std(self.settings.cache_ttl).unwrap_or(TimeDelta::MAX)
    }

    /// Generates a digest and stores it; failures leave the cache as it was.
    async fn refresh(&self, now: DateTime<Utc>) -> Result<CachedDigest> {
        let digest = self.generate(now).await?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(digest.clone());
        Ok(digest)
    }

    async fn generate(&self, now: DateTime<Utc>) -> Result<CachedDigest> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            error!("GEMINI_API_KEY is not configured");
            DigestError::Configuration("GEMINI_API_KEY is not set".to_string())
        })?;

        let prompt = DigestPrompt::new(now).render();
        let request = GenerateContentRequest::new(prompt, self.settings.grounding);

        let started = Instant::now();
        let reply = tokio::time::timeout(
            self.settings.upstream_timeout,
            self.provider.dispatch(api_key, &request),
        )
        .await
        .map_err(|_| {
            DigestError::Transport(format!("no response within {:?}", self.settings.upstream_timeout))
        })
        .and_then(|result| result)
        .inspect_err(|e| error!(error = %e, "provider call failed"))?;

        info!(status = reply.status, elapsed = ?started.elapsed(), "provider call completed");

        if !reply.is_success() {
            let err = DigestError::UpstreamStatus {
                status: reply.status,
                body: reply.body,
            };
            error!(status = reply.status, detail = ?err.detail(), "provider returned an error status");
            return Err(err);
        }

        let response = extract::decode(&reply.body)
            .inspect_err(|e| error!(error = %e, "provider body is not valid JSON"))?;
        let candidate = response
            .first_candidate()
            .inspect_err(|e| error!(error = %e, "provider returned no candidate"))?;
        let summary = extract::summary_text(candidate)?;

        let (sources, search_queries, search_entry_point_html) = if request.grounding_requested() {
            let grounding = extract::grounding(candidate);
            if grounding.sources.is_empty() {
                warn!("grounding requested but no sources returned");
            }
            debug!(
                sources = grounding.sources.len(),
                queries = grounding.search_queries.len(),
                "grounding extracted"
            );
            (
                Some(grounding.sources),
                Some(grounding.search_queries),
                grounding.search_entry_point_html,
            )
        } else {
            (None, None, None)
        };

        info!(chars = summary.chars().count(), "digest generated");

        Ok(CachedDigest {
            summary,
            sources,
            search_queries,
            search_entry_point_html,
            generated_at: now,
            ttl: self.ttl(),
            model: self.provider.model().to_string(),
        })
    }
}
