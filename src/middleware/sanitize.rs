//! Recursive payload sanitizer.
//!
//! Strips all markup from the string leaves of JSON-shaped request data with
//! an allow-nothing policy; the content of `script`-type blocks is dropped
//! entirely rather than just the tags. Container shape (object key set, array
//! length and order) is preserved exactly, so handlers can rely on the
//! structure of what they receive while trusting its strings.
//!
//! The middleware rewrites all three request facets before the handler runs:
//! the JSON body, the query string and the percent-encoded path segments.
//! Payloads that cannot be parsed fail closed: the request is rejected, never
//! forwarded unsanitized.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        uri::Uri,
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use serde_json::Value;

/// Largest body the sanitizer will buffer; matches the router's body limit.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Why a payload could not be sanitized. Always maps to a fail-closed
/// rejection of the request.
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("failed to read body: {0}")]
    BodyRead(String),
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("rewritten URI is invalid: {0}")]
    InvalidUri(String),
}

impl From<SanitizeError> for AppError {
    fn from(err: SanitizeError) -> Self {
        AppError::SanitizationFailed(err.to_string())
    }
}

/// Tags whose entire content is dropped, not just the surrounding markup.
const DROP_CONTENT_TAGS: [&str; 2] = ["script", "style"];

/// Stripping passes before a leaf is considered hostile and emptied.
const MAX_STRIP_PASSES: usize = 16;

/// Returns `value` with every string leaf stripped of markup. Pure; container
/// shape is preserved exactly and non-string scalars are returned unchanged.
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_markup(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), sanitize_value(item));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Strips all markup from a string with an empty allow-list.
///
/// Stripping repeats until a fixed point so that removals cannot splice new
/// markup together (`<<b>script>` and friends). A leaf still changing after
/// [`MAX_STRIP_PASSES`] is emptied.
pub fn strip_markup(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_STRIP_PASSES {
        let stripped = strip_pass(&current);
        if stripped == current {
            return stripped;
        }
        current = stripped;
    }
    String::new()
}

enum Tag {
    Comment { len: usize },
    Element { name: String, len: usize, closing: bool },
}

/// Parses the markup construct at the start of `tail` (which begins with
/// `<`). Returns `None` when the `<` is a literal character, not markup.
fn parse_tag(tail: &str) -> Option<Tag> {
    if tail.starts_with("<!--") {
        let len = tail.find("-->").map(|i| i + 3).unwrap_or(tail.len());
        return Some(Tag::Comment { len });
    }

    let bytes = tail.as_bytes();
    let second = *bytes.get(1)?;
    if second != b'/' && second != b'!' && !second.is_ascii_alphabetic() {
        return None;
    }

    let closing = second == b'/';
    let name_start = if closing { 2 } else { 1 };
    let name: String = bytes[name_start.min(bytes.len())..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric())
        .map(|b| b.to_ascii_lowercase() as char)
        .collect();

    // An unterminated tag swallows the remainder of the leaf.
    let len = bytes.iter().position(|&b| b == b'>').map(|i| i + 1).unwrap_or(bytes.len());
    Some(Tag::Element { name, len, closing })
}

/// Finds the end of the closing tag for `name` in `haystack`, returning the
/// byte offset just past its `>`.
fn find_close(haystack: &str, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    let mut i = 0;
    while i + nee.len() <= hay.len() {
        if hay[i..i + nee.len()].eq_ignore_ascii_case(nee) {
            let rest = &hay[i + nee.len()..];
            match rest.first() {
                Some(b'>') => return Some(i + nee.len() + 1),
                Some(b) if b.is_ascii_whitespace() || *b == b'/' => {
                    let gt = rest.iter().position(|&b| b == b'>')?;
                    return Some(i + nee.len() + gt + 1);
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn strip_pass(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match parse_tag(tail) {
            Some(Tag::Comment { len }) => rest = &tail[len..],
            Some(Tag::Element { name, len, closing }) => {
                if !closing && DROP_CONTENT_TAGS.contains(&name.as_str()) {
                    let after = &tail[len..];
                    match find_close(after, &name) {
                        Some(end) => rest = &after[end..],
                        // Unterminated block: drop the remainder.
                        None => rest = "",
                    }
                } else {
                    rest = &tail[len..];
                }
            }
            None => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn percent_encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Sanitizes every percent-decoded path segment. Segments that decode clean
/// keep their original encoding.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let decoded = percent_decode(segment);
            let stripped = strip_markup(&decoded);
            if stripped == decoded {
                segment.to_string()
            } else {
                percent_encode_segment(&stripped)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Sanitizes query parameter values. Keys are structure, not content, and
/// stay untouched.
fn sanitize_query(query: &str) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        out.append_pair(&key, &strip_markup(&value));
    }
    out.finish()
}

/// Rewrites the request URI when path or query sanitization changed anything.
fn sanitize_uri(uri: &Uri) -> Result<Option<Uri>, SanitizeError> {
    let new_path = sanitize_path(uri.path());
    let new_query = uri.query().map(sanitize_query);

    if new_path == uri.path() && new_query.as_deref() == uri.query() {
        return Ok(None);
    }

    let path_and_query = match new_query.as_deref() {
        Some(q) if !q.is_empty() => format!("{}?{}", new_path, q),
        _ => new_path,
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query =
        Some(path_and_query.parse().map_err(|e| SanitizeError::InvalidUri(format!("{}", e)))?);
    Uri::from_parts(parts).map(Some).map_err(|e| SanitizeError::InvalidUri(format!("{}", e)))
}

fn has_json_body(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}

/// An Axum middleware replacing body, query and path parameters with their
/// sanitized counterparts before the handler runs.
pub async fn sanitize_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let sanitize_body = has_json_body(&req);
    let (mut parts, body) = req.into_parts();

    if let Some(uri) = sanitize_uri(&parts.uri)? {
        parts.uri = uri;
    }

    let body = if sanitize_body {
        let bytes = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| SanitizeError::BodyRead(format!("{}", e)))?;
        if bytes.is_empty() {
            Body::from(bytes)
        } else {
            let value: Value = serde_json::from_slice(&bytes).map_err(SanitizeError::from)?;
            let encoded =
                serde_json::to_vec(&sanitize_value(&value)).map_err(SanitizeError::from)?;
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(encoded.len()));
            state.metrics.inc_payloads_sanitized();
            Body::from(encoded)
        }
    } else {
        body
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}
