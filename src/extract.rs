//! Tolerant parsing of the provider's `generateContent` response.
//!
//! Every field is optional. Sub-shapes that don't match are dropped one
//! element at a time instead of failing the whole body, so a broken citation
//! can never cost us the summary text.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DigestError, Result};

pub const MAX_SOURCES: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub candidates: Vec<Candidate>,
    #[serde(default, deserialize_with = "lenient")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, deserialize_with = "lenient")]
    pub block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<CandidateContent>,
    #[serde(default, deserialize_with = "lenient")]
    pub finish_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentPart {
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub web_search_queries: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub search_entry_point: Option<SearchEntryPoint>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, deserialize_with = "lenient")]
    pub web: Option<WebReference>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebReference {
    #[serde(default, deserialize_with = "lenient")]
    pub uri: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntryPoint {
    #[serde(default, deserialize_with = "lenient")]
    pub rendered_content: Option<String>,
}

/// One cited web page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub url: String,
    pub title: String,
}

/// Citation data pulled from a candidate's grounding metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grounding {
    pub sources: Vec<Source>,
    pub search_queries: Vec<String>,
    pub search_entry_point_html: Option<String>,
}

/// Accepts any JSON for `T`, falling back to `T::default()` on a shape mismatch.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Keeps the array elements that decode as `T` and drops the rest.
fn lenient_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Decodes a raw provider body. Only non-JSON input is an error.
pub fn decode(body: &str) -> Result<ExternalResponse> {
    let response = serde_json::from_str::<ExternalResponse>(body)?;
    Ok(response)
}

impl ExternalResponse {
    pub fn first_candidate(&self) -> Result<&Candidate> {
        self.candidates.first().ok_or_else(|| {
            let reason = self
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref());
            match reason {
                Some(reason) => DigestError::EmptyResult(format!("no candidates (blocked: {})", reason)),
                None => DigestError::EmptyResult("no candidates".to_string()),
            }
        })
    }
}

/// Joins the candidate's text parts in order and trims the result.
pub fn summary_text(candidate: &Candidate) -> Result<String> {
    let text: String = candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();

    let text = text.trim();
    if text.is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        warn!(finish_reason = reason, "candidate carried no text");
        return Err(DigestError::EmptyResult(format!("candidate has no text (finish reason: {})", reason)));
    }
    Ok(text.to_string())
}

/// Extracts citations, deduplicated by url in first-seen order and capped at
/// [`MAX_SOURCES`]. Missing metadata yields an empty [`Grounding`].
pub fn grounding(candidate: &Candidate) -> Grounding {
    let Some(meta) = candidate.grounding_metadata.as_ref() else {
        debug!("candidate has no grounding metadata");
        return Grounding::default();
    };

    let mut sources: Vec<Source> = Vec::new();
    for web in meta.grounding_chunks.iter().filter_map(|chunk| chunk.web.as_ref()) {
        let Some(url) = web.uri.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            continue;
        };
        if sources.iter().any(|s| s.url == url) {
            continue;
        }
        let title = web
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(url);
        sources.push(Source {
            url: url.to_string(),
            title: title.to_string(),
        });
        if sources.len() == MAX_SOURCES {
            break;
        }
    }

    Grounding {
        sources,
        search_queries: meta.web_search_queries.clone(),
        search_entry_point_html: meta
            .search_entry_point
            .as_ref()
            .and_then(|entry| entry.rendered_content.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(value: Value) -> Candidate {
        let response = decode(&json!({ "candidates": [value] }).to_string()).unwrap();
        response.candidates.into_iter().next().unwrap()
    }

    fn chunk(uri: &str, title: &str) -> Value {
        json!({ "web": { "uri": uri, "title": title } })
    }

    #[test]
    fn text_parts_are_joined_and_trimmed() {
        let c = candidate(json!({
            "content": { "parts": [
                { "text": "  1. 국제정세: " },
                { "inlineData": { "mimeType": "image/png" } },
                { "text": "휴전 협상 진행.\n" }
            ]}
        }));
        assert_eq!(summary_text(&c).unwrap(), "1. 국제정세: 휴전 협상 진행.");
    }

    #[test]
    fn whitespace_only_text_is_empty_result() {
        let c = candidate(json!({
            "content": { "parts": [{ "text": "  \n " }] },
            "finishReason": "MAX_TOKENS"
        }));
        let err = summary_text(&c).unwrap_err();
        assert!(matches!(err, DigestError::EmptyResult(msg) if msg.contains("MAX_TOKENS")));
    }

    #[test]
    fn missing_candidates_reports_block_reason() {
        let response = decode(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = response.first_candidate().unwrap_err();
        assert!(matches!(err, DigestError::EmptyResult(msg) if msg.contains("SAFETY")));
    }

    #[test]
    fn non_json_body_is_decode_error() {
        assert!(matches!(decode("<html>502</html>"), Err(DigestError::Decode(_))));
    }

    #[test]
    fn sources_are_deduplicated_in_first_seen_order() {
        let c = candidate(json!({
            "groundingMetadata": { "groundingChunks": [
                chunk("https://a.test", "A"),
                chunk("https://b.test", "B"),
                chunk("https://a.test", "A again"),
                chunk("https://c.test", "C"),
                chunk("https://a.test", "A third"),
            ]}
        }));
        let urls: Vec<_> = grounding(&c).sources.into_iter().map(|s| (s.url, s.title)).collect();
        assert_eq!(
            urls,
            vec![
                ("https://a.test".to_string(), "A".to_string()),
                ("https://b.test".to_string(), "B".to_string()),
                ("https://c.test".to_string(), "C".to_string()),
            ]
        );
    }

    #[test]
    fn sources_are_capped() {
        let chunks: Vec<Value> = (0..15)
            .map(|i| chunk(&format!("https://{}.test", i), "t"))
            .collect();
        let c = candidate(json!({ "groundingMetadata": { "groundingChunks": chunks } }));
        let sources = grounding(&c).sources;
        assert_eq!(sources.len(), MAX_SOURCES);
        assert_eq!(sources[9].url, "https://9.test");
    }

    #[test]
    fn missing_title_falls_back_to_url() {
        let c = candidate(json!({
            "groundingMetadata": { "groundingChunks": [
                { "web": { "uri": "https://untitled.test" } },
                { "web": { "uri": "https://blank.test", "title": "" } }
            ]}
        }));
        let sources = grounding(&c).sources;
        assert_eq!(sources[0].title, "https://untitled.test");
        assert_eq!(sources[1].title, "https://blank.test");
    }

    #[test]
    fn malformed_chunks_are_dropped_not_fatal() {
        let c = candidate(json!({
            "content": { "parts": [{ "text": "ok" }] },
            "groundingMetadata": {
                "groundingChunks": [
                    "not-an-object",
                    { "web": null },
                    { "web": { "title": "no uri" } },
                    { "web": { "uri": 42 } },
                    { "retrievedContext": { "uri": "gs://x" } },
                    chunk("https://kept.test", "Kept")
                ],
                "webSearchQueries": ["미국 증시", 7, "미국 증시"],
                "searchEntryPoint": { "renderedContent": "<div class=\"chips\"></div>" }
            }
        }));
        assert_eq!(summary_text(&c).unwrap(), "ok");
        let g = grounding(&c);
        assert_eq!(g.sources, vec![Source { url: "https://kept.test".into(), title: "Kept".into() }]);
        assert_eq!(g.search_queries, vec!["미국 증시", "미국 증시"]);
        assert_eq!(g.search_entry_point_html.as_deref(), Some("<div class=\"chips\"></div>"));
    }

    #[test]
    fn grounding_metadata_of_wrong_type_yields_nothing() {
        let c = candidate(json!({
            "content": { "parts": [{ "text": "ok" }] },
            "groundingMetadata": "oops"
        }));
        assert_eq!(grounding(&c), Grounding::default());
    }
}
