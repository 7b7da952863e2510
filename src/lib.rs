//! # MediChat Backend Library
//!
//! This is the core library for MediChat, a healthcare chat assistant
//! backend. Its center of gravity is the request security pipeline: a chain
//! of stateful, order-sensitive checks applied to every inbound HTTP request
//! before it reaches application logic.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: Modern web framework for HTTP server and routing
//! - **Tokio**: Async runtime for concurrent operations
//! - **Tracing**: Structured diagnostics and the audit log sink
//! - **Serde**: Serialization/deserialization for JSON APIs
//!
//! ## Core Components
//!
//! - [`config`]: Application configuration management
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`metrics`]: Security pipeline counters
//! - [`middleware`]: The request security pipeline (rate limiting, CSRF,
//!   security headers, payload sanitization, audit trail)
//! - [`routes`]: HTTP API endpoint handlers and router assembly
//! - [`state`]: Shared application state and resource management
//! - [`types`]: Data transfer objects and shared type definitions
//!
//! ## Pipeline
//!
//! Inbound requests pass through HTTPS enforcement and the security-header
//! composer, the fixed-window rate limiter, double-submit-cookie CSRF
//! validation, the recursive payload sanitizer and the audit emitter, in that
//! order. Any stage may short-circuit with a terminal rejection; headers from
//! the composer are attached to every response, rejections included.

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
