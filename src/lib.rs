pub mod api;
pub mod config;
pub mod digest;
pub mod error;
pub mod extract;
pub mod llm;
pub mod prompt;

use std::sync::Arc;
use config::Config;
use digest::DigestService;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub digest: Arc<DigestService>,
}
