use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Security pipeline counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub requests_seen: Arc<AtomicU64>,
    pub rate_limited: Arc<AtomicU64>,
    pub csrf_rejected: Arc<AtomicU64>,
    pub csrf_tokens_issued: Arc<AtomicU64>,
    pub https_redirects: Arc<AtomicU64>,
    pub payloads_sanitized: Arc<AtomicU64>,
    pub audit_records_dropped: Arc<AtomicUsize>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_seen: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            csrf_rejected: Arc::new(AtomicU64::new(0)),
            csrf_tokens_issued: Arc::new(AtomicU64::new(0)),
            https_redirects: Arc::new(AtomicU64::new(0)),
            payloads_sanitized: Arc::new(AtomicU64::new(0)),
            audit_records_dropped: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_requests_seen(&self) {
        self.requests_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_rejected(&self) {
        self.csrf_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_tokens_issued(&self) {
        self.csrf_tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_https_redirects(&self) {
        self.https_redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_payloads_sanitized(&self) {
        self.payloads_sanitized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_audit_records_dropped(&self) {
        self.audit_records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_seen: self.requests_seen.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            csrf_rejected: self.csrf_rejected.load(Ordering::Relaxed),
            csrf_tokens_issued: self.csrf_tokens_issued.load(Ordering::Relaxed),
            https_redirects: self.https_redirects.load(Ordering::Relaxed),
            payloads_sanitized: self.payloads_sanitized.load(Ordering::Relaxed),
            audit_records_dropped: self.audit_records_dropped.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub requests_seen: u64,
    pub rate_limited: u64,
    pub csrf_rejected: u64,
    pub csrf_tokens_issued: u64,
    pub https_redirects: u64,
    pub payloads_sanitized: u64,
    pub audit_records_dropped: usize,
    pub uptime_seconds: u64,
}
