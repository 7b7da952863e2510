//! Security headers middleware for HTTP responses.
//!
//! The protective header set is composed once at startup from configuration
//! and applied unchanged to every response, including rejections produced by
//! inner pipeline stages. Plain-HTTP traffic is redirected to HTTPS in
//! production before any other stage runs.

use crate::config::{AppConfig, CspMode};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// An ordered, immutable set of protective response headers.
pub struct SecurityHeaderSet {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaderSet {
    /// Composes the full header set for the configured environment.
    pub fn compose(cfg: &AppConfig) -> Self {
        let mut headers: Vec<(HeaderName, HeaderValue)> = vec![
            (
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            ),
            (HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY")),
            (
                HeaderName::from_static("referrer-policy"),
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                HeaderName::from_static("permissions-policy"),
                HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
            ),
        ];

        // CSP: self plus the LLM gateway origin, the inline style/script the
        // chat UI framework needs, and secure WebSocket upgrades. Enforced in
        // production, report-only elsewhere.
        let csp_value = csp_directives(&cfg.security.llm_gateway_origin);
        let csp_name = match cfg.server.environment.csp_mode() {
            CspMode::Enforce => HeaderName::from_static("content-security-policy"),
            CspMode::ReportOnly => HeaderName::from_static("content-security-policy-report-only"),
        };
        if let Ok(value) = HeaderValue::from_str(&csp_value) {
            headers.push((csp_name, value));
        }

        let hsts = format!(
            "max-age={}{}{}",
            cfg.security.hsts_max_age,
            if cfg.security.hsts_include_subdomains { "; includeSubDomains" } else { "" },
            if cfg.security.hsts_preload { "; preload" } else { "" },
        );
        if let Ok(value) = HeaderValue::from_str(&hsts) {
            headers.push((HeaderName::from_static("strict-transport-security"), value));
        }

        Self { headers }
    }

    /// Applies the set to a response's headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.iter().find(|(n, _)| n.as_str() == name).map(|(_, v)| v)
    }
}

fn csp_directives(llm_gateway_origin: &str) -> String {
    format!(
        "default-src 'self'; \
         script-src 'self' 'unsafe-inline'; \
         style-src 'self' 'unsafe-inline'; \
         img-src 'self' data:; \
         connect-src 'self' {} wss:; \
         font-src 'self'; \
         object-src 'none'; \
         media-src 'self'; \
         frame-src 'none'; \
         frame-ancestors 'none'",
        llm_gateway_origin
    )
}

/// Attaches the composed header set to every response.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    state.security_headers.apply(res.headers_mut());
    res
}

/// Redirects plain-HTTP traffic to its HTTPS equivalent in production.
///
/// The check reads the `x-forwarded-proto` header set by the fronting proxy
/// and runs before every other pipeline stage.
pub async fn enforce_https_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.config.server.environment.is_production() {
        let proto = req.headers().get("x-forwarded-proto").and_then(|v| v.to_str().ok());
        if proto == Some("http") {
            let host = req.headers().get(header::HOST).and_then(|v| v.to_str().ok());
            if let Some(host) = host {
                let path_and_query =
                    req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
                let target = format!("https://{}{}", host, path_and_query);
                state.metrics.inc_https_redirects();
                tracing::info!(target_url = %target, "Redirecting plain-HTTP request");
                return (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, target)])
                    .into_response();
            }
            tracing::warn!("Plain-HTTP request without Host header; cannot build redirect");
        }
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    fn config(environment: Environment) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.server.environment = environment;
        cfg
    }

    #[test]
    fn fixed_headers_are_always_present() {
        let set = SecurityHeaderSet::compose(&config(Environment::Development));
        assert_eq!(set.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(set.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(set.get("referrer-policy").unwrap(), "strict-origin-when-cross-origin");
        assert_eq!(
            set.get("permissions-policy").unwrap(),
            "camera=(), microphone=(), geolocation=()"
        );
    }

    #[test]
    fn csp_is_enforced_only_in_production() {
        let prod = SecurityHeaderSet::compose(&config(Environment::Production));
        assert!(prod.get("content-security-policy").is_some());
        assert!(prod.get("content-security-policy-report-only").is_none());

        let dev = SecurityHeaderSet::compose(&config(Environment::Development));
        assert!(dev.get("content-security-policy").is_none());
        assert!(dev.get("content-security-policy-report-only").is_some());
    }

    #[test]
    fn csp_allow_list_covers_the_llm_gateway_and_websockets() {
        let cfg = config(Environment::Production);
        let set = SecurityHeaderSet::compose(&cfg);
        let csp = set.get("content-security-policy").unwrap().to_str().unwrap();
        assert!(csp.contains("default-src 'self'"));
        assert!(csp.contains(&cfg.security.llm_gateway_origin));
        assert!(csp.contains("wss:"));
        assert!(csp.contains("object-src 'none'"));
    }

    #[test]
    fn hsts_carries_the_configured_directives() {
        let set = SecurityHeaderSet::compose(&config(Environment::Production));
        let hsts = set.get("strict-transport-security").unwrap().to_str().unwrap();
        assert_eq!(hsts, "max-age=31536000; includeSubDomains; preload");
    }
}
