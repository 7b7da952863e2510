use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::audit::AuditEmitter;
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::security_headers::SecurityHeaderSet;

/// The shared application state.
///
/// Owns all pipeline state: the composed security header set, the rate-limit
/// window store and the audit channel. Constructed per deployment instance
/// (and per test), never ambient; handlers and middleware receive it through
/// Axum's state extraction.
#[derive(Clone)]
pub struct AppState {
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Protective response headers, composed once at startup.
    pub security_headers: Arc<SecurityHeaderSet>,
    /// The fixed-window rate limiter and its per-client window store.
    pub rate_limiter: RateLimiter,
    /// Fire-and-forget audit record writer.
    pub audit: AuditEmitter,
    /// Security pipeline counters.
    pub metrics: Metrics,
}

impl AppState {
    /// Creates a new `AppState` with initialized pipeline components.
    ///
    /// Spawns the audit writer task, so this must run inside a Tokio runtime.
    pub fn new(config: AppConfig) -> Self {
        let metrics = Metrics::new();
        let security_headers = Arc::new(SecurityHeaderSet::compose(&config));
        let rate_limiter = RateLimiter::new(&config.rate_limit);
        let audit = AuditEmitter::spawn(metrics.clone());

        Self { config: Arc::new(config), security_headers, rate_limiter, audit, metrics }
    }
}
