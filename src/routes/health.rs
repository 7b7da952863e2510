use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, exempt from rate limiting
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP medichat_requests_seen Requests entering the security pipeline\n# TYPE medichat_requests_seen counter\nmedichat_requests_seen {}\n\
# HELP medichat_rate_limited Requests rejected by the rate limiter\n# TYPE medichat_rate_limited counter\nmedichat_rate_limited {}\n\
# HELP medichat_csrf_rejected Requests rejected by CSRF validation\n# TYPE medichat_csrf_rejected counter\nmedichat_csrf_rejected {}\n\
# HELP medichat_csrf_tokens_issued CSRF cookies issued\n# TYPE medichat_csrf_tokens_issued counter\nmedichat_csrf_tokens_issued {}\n\
# HELP medichat_https_redirects Plain-HTTP requests redirected\n# TYPE medichat_https_redirects counter\nmedichat_https_redirects {}\n\
# HELP medichat_payloads_sanitized JSON bodies rewritten by the sanitizer\n# TYPE medichat_payloads_sanitized counter\nmedichat_payloads_sanitized {}\n\
# HELP medichat_audit_records_dropped Audit records lost to a closed sink\n# TYPE medichat_audit_records_dropped counter\nmedichat_audit_records_dropped {}\n\
# HELP medichat_uptime_seconds Uptime seconds\n# TYPE medichat_uptime_seconds gauge\nmedichat_uptime_seconds {}\n",
        m.requests_seen,
        m.rate_limited,
        m.csrf_rejected,
        m.csrf_tokens_issued,
        m.https_redirects,
        m.payloads_sanitized,
        m.audit_records_dropped,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
