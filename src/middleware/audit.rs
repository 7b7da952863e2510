//! Per-request audit trail.
//!
//! One structured record is emitted for every request that reaches this
//! stage. Emission is fire-and-forget: records travel over an unbounded
//! channel to a background writer task, so the response path never waits on
//! the log sink, and a dead sink only bumps a counter.

use super::client_id::client_identifier;
use crate::metrics::Metrics;
use crate::state::AppState;
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Compliance tag stamped on every record (HIPAA §164.312(b), audit controls).
pub const COMPLIANCE_TAG: &str = "hipaa-164.312b";

/// Header carrying the pseudonymous user identifier assigned at sign-in.
const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub client: String,
    pub user: String,
    pub compliance: &'static str,
}

impl AuditRecord {
    pub fn from_request(req: &Request) -> Self {
        let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
        Self {
            timestamp: Utc::now(),
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            client: client_identifier(req.headers(), remote_ip),
            user: pseudonymous_user(req.headers()),
            compliance: COMPLIANCE_TAG,
        }
    }
}

fn pseudonymous_user(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Best-effort writer for audit records.
#[derive(Clone)]
pub struct AuditEmitter {
    tx: mpsc::UnboundedSender<AuditRecord>,
    metrics: Metrics,
}

impl AuditEmitter {
    /// Starts the background writer task and returns the emitter handle.
    pub fn spawn(metrics: Metrics) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditRecord>();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match serde_json::to_string(&record) {
                    Ok(line) => tracing::info!(target: "audit", "{}", line),
                    Err(e) => tracing::warn!("Failed to encode audit record: {}", e),
                }
            }
        });
        Self { tx, metrics }
    }

    /// Submits a record. Never blocks and never fails the request; a closed
    /// sink is counted and otherwise ignored.
    pub fn record(&self, record: AuditRecord) {
        if self.tx.send(record).is_err() {
            self.metrics.inc_audit_records_dropped();
        }
    }
}

/// An Axum middleware recording every request that passed the security
/// stages before it.
pub async fn audit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    state.audit.record(AuditRecord::from_request(&req));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::atomic::Ordering;

    #[test]
    fn user_defaults_to_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(pseudonymous_user(&headers), "anonymous");

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(pseudonymous_user(&headers), "anonymous");

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1142"));
        assert_eq!(pseudonymous_user(&headers), "u-1142");
    }

    #[test]
    fn records_serialize_with_the_compliance_tag() {
        let record = AuditRecord {
            timestamp: Utc::now(),
            method: "POST".to_string(),
            path: "/api/chat/messages".to_string(),
            client: "1.2.3.4".to_string(),
            user: "anonymous".to_string(),
            compliance: COMPLIANCE_TAG,
        };
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("hipaa-164.312b"));
        assert!(line.contains("\"method\":\"POST\""));
    }

    #[tokio::test]
    async fn closed_sink_is_swallowed_and_counted() {
        let metrics = Metrics::new();
        let (tx, rx) = mpsc::unbounded_channel::<AuditRecord>();
        drop(rx);
        let emitter = AuditEmitter { tx, metrics: metrics.clone() };

        emitter.record(AuditRecord {
            timestamp: Utc::now(),
            method: "GET".to_string(),
            path: "/api/session".to_string(),
            client: "unknown".to_string(),
            user: "anonymous".to_string(),
            compliance: COMPLIANCE_TAG,
        });

        assert_eq!(metrics.audit_records_dropped.load(Ordering::Relaxed), 1);
    }
}
