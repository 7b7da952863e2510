//! HTTP API endpoint handlers and router assembly.

pub mod chat;
pub mod health;

use std::convert::Infallible;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::{
    routing::{get, post},
    Router,
};
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware;
use crate::middleware::sanitize::MAX_BODY_BYTES;
use crate::state::AppState;

/// Builds the inner router: application routes plus per-route layers.
fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/api/session", get(chat::session))
        .route("/api/chat/messages", post(chat::post_message))
        .route("/api/chat/conversations/{id}/messages", get(chat::list_messages))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http());

    // CORS: permissive in debug for local development with a separate UI dev
    // server; not needed in release (same-origin)
    if cfg!(debug_assertions) {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Assembles the full application: the security pipeline wrapped around the
/// router.
///
/// The pipeline stages are applied around the `Router` rather than with
/// `Router::layer` because routing must see the sanitizer's rewritten URI;
/// `Router::layer` middleware runs after route matching. Stage order as seen
/// by a request: security headers (response side applies to every outcome) →
/// HTTPS enforcement → rate limiter → CSRF → sanitizer → audit → routing and
/// handler. Each stage can short-circuit with a terminal rejection; later
/// stages never run for a rejected request.
pub fn build_app(state: AppState) -> BoxCloneSyncService<Request, Response, Infallible> {
    let pipeline = ServiceBuilder::new()
        .layer(from_fn_with_state(
            state.clone(),
            middleware::security_headers::security_headers_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::security_headers::enforce_https_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::csrf::csrf_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::sanitize::sanitize_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::audit::audit_middleware))
        .service(build_router(state));
    BoxCloneSyncService::new(pipeline)
}
