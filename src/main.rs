use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use news_digest::{
    api::routes::create_router,
    config::Config,
    digest::DigestService,
    llm::GeminiClient,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let server_addr = config.server_addr;
    info!(settings = ?config.digest, "loaded configuration");
    if config.digest.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; digest requests will fail until it is configured");
    }

    let provider = GeminiClient::new(
        config.digest.api_base.clone(),
        config.digest.model.clone(),
        config.digest.upstream_timeout,
    );
    let digest = DigestService::new(Arc::new(provider), config.digest.clone());

    let app_state = AppState {
        config: Arc::new(config),
        digest: Arc::new(digest),
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;

    info!(%server_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
