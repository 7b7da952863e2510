//! Cross-Site Request Forgery protection using the double-submit-cookie
//! pattern.
//!
//! A 32-byte token from the OS random source is issued once per cookie
//! lifetime in an HttpOnly `csrf-token` cookie. State-changing requests must
//! echo the token in the `x-csrf-token` header; header and cookie are compared
//! over their decoded bytes in constant time.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

pub const CSRF_COOKIE: &str = "csrf-token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Raw token length in bytes; rendered as 64 hexadecimal characters.
const TOKEN_BYTES: usize = 32;

/// Generates a fresh token from the OS CSPRNG, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Extracts the CSRF token from the request's `Cookie` headers, if present.
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some(token) = pair.trim().strip_prefix(CSRF_COOKIE) {
                if let Some(token) = token.strip_prefix('=') {
                    return Some(token.trim().to_string());
                }
            }
        }
    }
    None
}

/// Constant-time comparison of two hex-encoded tokens over their decoded
/// bytes.
///
/// A length mismatch rejects before the byte comparison. Token length is
/// fixed and public, so the early return reveals nothing an attacker does not
/// already know; only the content comparison needs to be constant-time.
pub fn tokens_match(header_token: &str, cookie_token: &str) -> bool {
    let (Ok(header_bytes), Ok(cookie_bytes)) = (hex::decode(header_token), hex::decode(cookie_token))
    else {
        return false;
    };
    if header_bytes.len() != cookie_bytes.len() {
        return false;
    }
    header_bytes.ct_eq(&cookie_bytes).into()
}

/// Double-submit validation: both the header and the cookie token must be
/// present and byte-identical.
pub fn validate(headers: &HeaderMap) -> Result<(), AppError> {
    let header_token = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    let cookie = cookie_token(headers);
    match (header_token, cookie) {
        (Some(h), Some(c)) if tokens_match(h, &c) => Ok(()),
        _ => Err(AppError::CsrfRejected),
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(method, &Method::POST | &Method::PUT | &Method::DELETE | &Method::PATCH)
}

/// CSRF middleware: validates state-changing requests, then issues a token
/// cookie on the response when the request carried none.
///
/// A rejected request short-circuits here; its body is never sanitized or
/// forwarded, and no cookie is issued. Clients recover by revisiting any GET
/// endpoint.
pub async fn csrf_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let had_cookie = cookie_token(req.headers()).is_some();

    if is_state_changing(req.method()) {
        if let Err(err) = validate(req.headers()) {
            tracing::warn!(method = %req.method(), path = %req.uri().path(), "CSRF validation failed");
            state.metrics.inc_csrf_rejected();
            return err.into_response();
        }
    }

    let mut res = next.run(req).await;

    if !had_cookie {
        let cookie = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict{}",
            CSRF_COOKIE,
            generate_token(),
            state.config.csrf.cookie_max_age_seconds,
            if state.config.server.environment.is_production() { "; Secure" } else { "" },
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                res.headers_mut().append(header::SET_COOKIE, value);
                state.metrics.inc_csrf_tokens_issued();
            }
            Err(e) => tracing::error!("Failed to encode CSRF cookie: {}", e),
        }
    }

    res
}
