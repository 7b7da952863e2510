#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt; // for .collect()
    use serde_json::{json, Value};
    use std::convert::Infallible;
    use tower::{util::BoxCloneSyncService, ServiceExt};

    use crate::config::{AppConfig, Environment, RateLimitConfig};
    use crate::middleware::csrf::{generate_token, CSRF_COOKIE, CSRF_HEADER};
    use crate::routes;
    use crate::state::AppState;

    type App = BoxCloneSyncService<Request<Body>, Response, Infallible>;

    fn app_with(cfg: AppConfig) -> App {
        routes::build_app(AppState::new(cfg))
    }

    fn default_app() -> App {
        app_with(AppConfig::default())
    }

    fn production_app() -> App {
        let mut cfg = AppConfig::default();
        cfg.server.environment = Environment::Production;
        app_with(cfg)
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(res: axum::response::Response) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_message(body: &str, csrf: Option<(&str, &str)>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/chat/messages")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some((header_token, cookie_token)) = csrf {
            builder = builder
                .header(CSRF_HEADER, header_token)
                .header(header::COOKIE, format!("{}={}", CSRF_COOKIE, cookie_token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    // ---------------- Rate limiting ----------------

    #[tokio::test]
    async fn edge_profile_allows_thirty_then_rejects_with_retry_hint() {
        let mut cfg = AppConfig::default();
        cfg.rate_limit = RateLimitConfig::edge_tier();
        let app = app_with(cfg);

        for i in 0..30 {
            let mut req = get("/api/session");
            req.headers_mut().insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK, "request {} should be allowed", i + 1);
        }

        let mut req = get("/api/session");
        req.headers_mut().insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(res).await;
        assert_eq!(body["retryAfter"], json!(60));
        assert!(body["error"].as_str().unwrap().contains("retry"));
    }

    #[tokio::test]
    async fn unidentified_clients_share_one_quota() {
        let mut cfg = AppConfig::default();
        cfg.rate_limit =
            RateLimitConfig { window_seconds: 60, max_requests: 2, exempt_paths: vec![] };
        let app = app_with(cfg);

        // No forwarded headers and no socket info: everyone is "unknown".
        assert_eq!(app.clone().oneshot(get("/api/session")).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.clone().oneshot(get("/version")).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.clone().oneshot(get("/api/session")).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn exempt_paths_bypass_the_limiter() {
        let mut cfg = AppConfig::default();
        cfg.rate_limit = RateLimitConfig {
            window_seconds: 60,
            max_requests: 1,
            exempt_paths: vec!["/healthz".to_string()],
        };
        let app = app_with(cfg);

        for _ in 0..5 {
            let res = app.clone().oneshot(get("/healthz")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        assert_eq!(app.clone().oneshot(get("/version")).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.clone().oneshot(get("/version")).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    // ---------------- CSRF ----------------

    #[tokio::test]
    async fn state_changing_request_without_tokens_is_rejected() {
        let app = default_app();
        let res = app.oneshot(post_message(r#"{"message":"hi"}"#, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        // Rejections still carry the composed security headers.
        assert_eq!(res.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(body_text(res).await, "CSRF token invalid");
    }

    #[tokio::test]
    async fn mismatched_tokens_are_rejected_regardless_of_content() {
        let app = default_app();
        let res = app
            .oneshot(post_message(r#"{"message":"hi"}"#, Some(("ab12", "ab13"))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(res).await, "CSRF token invalid");
    }

    #[tokio::test]
    async fn matching_tokens_are_accepted() {
        let app = default_app();
        let token = generate_token();
        let res = app
            .oneshot(post_message(r#"{"message":"hello"}"#, Some((&token, &token))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["message"], json!("hello"));
    }

    #[tokio::test]
    async fn get_requests_skip_csrf_validation() {
        let app = default_app();
        let res = app.oneshot(get("/api/session")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn csrf_cookie_is_issued_only_when_absent() {
        let app = default_app();

        let res = app.clone().oneshot(get("/api/session")).await.unwrap();
        let cookie = res.headers().get(header::SET_COOKIE).expect("cookie should be issued");
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("csrf-token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=86400"));
        // Development: no Secure attribute.
        assert!(!cookie.contains("Secure"));

        let mut req = get("/api/session");
        req.headers_mut()
            .insert(header::COOKIE, format!("{}=deadbeef", CSRF_COOKIE).parse().unwrap());
        let res = app.clone().oneshot(req).await.unwrap();
        assert!(res.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn csrf_cookie_is_secure_in_production() {
        let app = production_app();
        let res = app.oneshot(get("/api/session")).await.unwrap();
        let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("; Secure"));
    }

    // ---------------- Header policy & HTTPS enforcement ----------------

    #[tokio::test]
    async fn responses_carry_the_full_header_set() {
        let app = default_app();
        let res = app.oneshot(get("/healthz")).await.unwrap();
        let headers = res.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("referrer-policy").unwrap(), "strict-origin-when-cross-origin");
        assert!(headers.get("permissions-policy").is_some());
        assert!(headers.get("strict-transport-security").is_some());
        // Development runs CSP in report-only mode.
        assert!(headers.get("content-security-policy").is_none());
        assert!(headers.get("content-security-policy-report-only").is_some());
    }

    #[tokio::test]
    async fn production_enforces_csp() {
        let app = production_app();
        let res = app.oneshot(get("/healthz")).await.unwrap();
        assert!(res.headers().get("content-security-policy").is_some());
        assert!(res.headers().get("content-security-policy-report-only").is_none());
    }

    #[tokio::test]
    async fn plain_http_is_redirected_in_production() {
        let app = production_app();
        let mut req = get("/api/session");
        req.headers_mut().insert("x-forwarded-proto", "http".parse().unwrap());
        req.headers_mut().insert(header::HOST, "chat.example.org".parse().unwrap());
        let res = app.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "https://chat.example.org/api/session"
        );
        // The redirect, like every response, carries the header set.
        assert_eq!(res.headers().get("x-content-type-options").unwrap(), "nosniff");
    }

    #[tokio::test]
    async fn plain_http_is_tolerated_in_development() {
        let app = default_app();
        let mut req = get("/api/session");
        req.headers_mut().insert("x-forwarded-proto", "http".parse().unwrap());
        req.headers_mut().insert(header::HOST, "localhost:8700".parse().unwrap());
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    // ---------------- Sanitizer ----------------

    #[tokio::test]
    async fn json_bodies_reach_handlers_sanitized() {
        let app = default_app();
        let token = generate_token();
        let res = app
            .oneshot(post_message(
                r#"{"message":"<script>alert(1)</script>hello"}"#,
                Some((&token, &token)),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["message"], json!("hello"));
    }

    #[tokio::test]
    async fn malformed_json_fails_closed() {
        let app = default_app();
        let token = generate_token();
        let res =
            app.oneshot(post_message("{not valid json", Some((&token, &token)))).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["error"]["code"], json!("SANITIZATION_FAILED"));
    }

    #[tokio::test]
    async fn query_parameters_reach_handlers_sanitized() {
        let app = default_app();
        let uri = "/api/chat/conversations/0bd7e5d2-3a41-4f7c-9b63-58a1c0a9d001/messages\
                   ?search=%3Cscript%3Ealert(1)%3C%2Fscript%3Eterm";
        let res = app.oneshot(get(uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["search"], json!("term"));
    }

    #[tokio::test]
    async fn path_parameters_reach_handlers_sanitized() {
        let app = default_app();
        let res =
            app.oneshot(get("/api/chat/conversations/%3Cb%3Eabc/messages")).await.unwrap();
        // The handler saw the stripped id "abc", not the markup.
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("invalid conversation id: abc"));
        assert!(!message.contains('<'));
    }

    // ---------------- Metrics ----------------

    #[tokio::test]
    async fn metrics_reflect_pipeline_activity() {
        let app = default_app();

        app.clone().oneshot(get("/api/session")).await.unwrap();
        app.clone().oneshot(post_message(r#"{"message":"hi"}"#, None)).await.unwrap();

        let res = app.clone().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert!(body["requests_seen"].as_u64().unwrap() >= 3);
        assert!(body["csrf_rejected"].as_u64().unwrap() >= 1);
    }
}
