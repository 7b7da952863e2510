//! Middleware components forming the request security pipeline.
//!
//! Every inbound request passes, in order, through HTTPS enforcement and the
//! security-header composer, the per-client rate limiter, CSRF validation for
//! state-changing methods, the recursive payload sanitizer and the audit
//! emitter before it reaches an application handler. Any stage may
//! short-circuit the chain with a terminal rejection; later stages never run
//! for a rejected request.

pub mod audit;
pub mod client_id;
pub mod csrf;
pub mod rate_limit;
pub mod sanitize;
pub mod security_headers;

pub use rate_limit::RateLimiter;
