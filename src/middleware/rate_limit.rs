use super::client_id::client_identifier;
use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::{hash_map::Entry, HashMap},
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Per-client counter state for one fixed window.
#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    window_reset_at: Instant,
}

/// A thread-safe fixed-window rate limiter.
///
/// One window is kept per client identifier. The counter resets hard at window
/// boundaries; there is no sliding or token-bucket smoothing. The structure is
/// explicitly owned and injected through [`AppState`] so each deployment and
/// each test constructs its own instance.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, ClientWindow>>>,
    max_requests: u32,
    window: Duration,
    exempt_paths: Arc<Vec<String>>,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests: cfg.max_requests,
            window: Duration::from_secs(cfg.window_seconds),
            exempt_paths: Arc::new(cfg.exempt_paths.clone()),
        }
    }

    /// Paths on the allow-list bypass the limiter entirely.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
    }

    /// Checks whether a request from `client` is allowed right now.
    pub async fn check(&self, client: &str) -> Result<(), AppError> {
        self.check_at(client, Instant::now()).await
    }

    /// Fixed-window check against an explicit clock value.
    ///
    /// The write lock makes the read-modify-write of a window atomic per call,
    /// so concurrent requests from the same identifier cannot lose updates.
    pub async fn check_at(&self, client: &str, now: Instant) -> Result<(), AppError> {
        let mut windows = self.windows.write().await;
        match windows.entry(client.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ClientWindow { count: 1, window_reset_at: now + self.window });
                Ok(())
            }
            Entry::Occupied(mut slot) => {
                let window = slot.get_mut();
                if now >= window.window_reset_at {
                    window.count = 1;
                    window.window_reset_at = now + self.window;
                    return Ok(());
                }
                window.count += 1;
                if window.count > self.max_requests {
                    // The retry hint is the full window length; we do not
                    // reveal how far into the window the client already is.
                    Err(AppError::RateLimited { retry_after_seconds: self.window.as_secs() })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Drops windows whose reset time has passed. An expired window is
    /// indistinguishable from an absent one, so removal never changes
    /// limiter decisions; it only bounds memory in long-running processes.
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        windows.retain(|_, w| now < w.window_reset_at);
    }
}

/// An Axum middleware applying the fixed-window limit per client identifier.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    state.metrics.inc_requests_seen();

    if state.rate_limiter.is_exempt(req.uri().path()) {
        return next.run(req).await;
    }

    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let client = client_identifier(req.headers(), remote_ip);

    match state.rate_limiter.check(&client).await {
        Ok(()) => next.run(req).await,
        Err(err) => {
            tracing::warn!(client = %client, path = %req.uri().path(), "Rate limit exceeded");
            state.metrics.inc_rate_limited();
            err.into_response()
        }
    }
}
