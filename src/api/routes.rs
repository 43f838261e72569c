use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::models::DigestResponse;
use crate::api::response;
use crate::config::DEFAULT_CACHE_CONTROL;
use crate::error::DigestError;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    let cache_control = cache_control_value(&app_state.config.cache_control);

    Router::new()
        .route(
            "/api/news",
            get(news_handler)
                // `get` would otherwise also answer HEAD
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route("/health", get(|| async { "ok" }))
        .layer(
            // Also answers OPTIONS pre-flight requests with an empty body.
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers(Any),
        )
        // Outside the CORS layer so pre-flight answers carry it too.
        .layer(SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, cache_control))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn cache_control_value(configured: &str) -> HeaderValue {
    HeaderValue::from_str(configured).unwrap_or_else(|_| {
        warn!(value = %configured, "invalid Cache-Control setting, using default");
        HeaderValue::from_static(DEFAULT_CACHE_CONTROL)
    })
}

async fn news_handler(State(state): State<AppState>) -> Response {
    let now = Utc::now();
    let start_time = std::time::Instant::now();

    match state.digest.get_digest(now).await {
        Ok(digest) => {
            let body = DigestResponse::new(digest, now);
            info!(
                cached = body.cached,
                generated_at = %body.digest.generated_at,
                elapsed = ?start_time.elapsed(),
                "served news digest"
            );
            response::success(body).into_response()
        }
        Err(err) => {
            warn!(error = %err, elapsed = ?start_time.elapsed(), "news digest request failed");
            err.into_response()
        }
    }
}

async fn method_not_allowed(method: Method) -> impl IntoResponse {
    warn!(%method, "rejected unsupported method");
    ([(header::ALLOW, "GET, OPTIONS")], DigestError::MethodNotAllowed)
}
