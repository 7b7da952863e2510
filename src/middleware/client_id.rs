use axum::http::HeaderMap;
use std::net::IpAddr;

/// Bucket identifier shared by all clients whose address cannot be
/// established. Unidentified clients therefore share one rate-limit quota;
/// this is intentional degraded behavior rather than per-client isolation.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client identifier from proxy headers and optional transport
/// metadata. `x-forwarded-for` wins over `x-real-ip`, which wins over the
/// socket address.
pub fn client_identifier(headers: &HeaderMap, fallback: Option<IpAddr>) -> String {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip.to_string();
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return ip.to_string();
        }
    }
    if let Some(ip) = fallback {
        return ip.to_string();
    }
    UNKNOWN_CLIENT.to_string()
}
