use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};

use crate::api::response;

/// Longest upstream diagnostic we echo back to a caller.
pub const MAX_DETAIL_CHARS: usize = 300;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to reach summarization provider: {0}")]
    Transport(String),

    #[error("Summarization provider returned status {status}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Provider returned no usable summary: {0}")]
    EmptyResult(String),

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl DigestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DigestError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DigestError::Transport(_)
            | DigestError::UpstreamStatus { .. }
            | DigestError::Decode(_)
            | DigestError::EmptyResult(_) => StatusCode::BAD_GATEWAY,
            DigestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Short caller-facing label; the full message stays in the server log.
    pub fn public_message(&self) -> &'static str {
        match self {
            DigestError::Configuration(_) => "Server is not configured to generate digests",
            DigestError::Transport(_) => "Summarization provider is unreachable",
            DigestError::UpstreamStatus { .. } => "Summarization provider request failed",
            DigestError::Decode(_) => "Summarization provider returned an unreadable response",
            DigestError::EmptyResult(_) => "Summarization provider returned an empty digest",
            DigestError::MethodNotAllowed => "Method not allowed",
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            DigestError::Configuration(_) | DigestError::MethodNotAllowed => None,
            DigestError::UpstreamStatus { status, body } => {
                Some(truncate_detail(&format!("status {}: {}", status, body)))
            }
            DigestError::Transport(msg)
            | DigestError::Decode(msg)
            | DigestError::EmptyResult(msg) => Some(truncate_detail(msg)),
        }
    }
}

impl IntoResponse for DigestError {
    fn into_response(self) -> Response {
        response::error(self.status_code(), self.public_message(), self.detail()).into_response()
    }
}

impl From<reqwest::Error> for DigestError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest embeds the URL in its messages; ours never carries the key.
        DigestError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DigestError {
    fn from(err: serde_json::Error) -> Self {
        DigestError::Decode(err.to_string())
    }
}

/// Cuts `text` to at most [`MAX_DETAIL_CHARS`] characters, ellipsis included.
pub fn truncate_detail(text: &str) -> String {
    if text.chars().nth(MAX_DETAIL_CHARS).is_none() {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(MAX_DETAIL_CHARS - 1)
        .map_or(text.len(), |(idx, _)| idx);
    format!("{}…", &text[..cut])
}

pub type Result<T> = std::result::Result<T, DigestError>;
