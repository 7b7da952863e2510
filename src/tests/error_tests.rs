#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    #[test]
    fn display_formats() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::RateLimited { retry_after_seconds: 60 };
        assert_eq!(format!("{}", error), "Rate limited. Retry after 60 seconds");

        let error = AppError::CsrfRejected;
        assert_eq!(format!("{}", error), "CSRF token invalid");

        let error = AppError::SanitizationFailed("cycle".to_string());
        assert_eq!(format!("{}", error), "Sanitization failed: cycle");
    }

    #[tokio::test]
    async fn rate_limited_renders_retry_after_body() {
        let response = AppError::RateLimited { retry_after_seconds: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["retryAfter"], json!(60));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn csrf_rejection_is_plain_text() {
        let response = AppError::CsrfRejected.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"CSRF token invalid");
    }

    #[tokio::test]
    async fn sanitization_failure_is_a_bad_request() {
        let response = AppError::SanitizationFailed("invalid JSON body".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], json!("SANITIZATION_FAILED"));
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::Internal(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn anyhow_errors_convert_to_internal() {
        let error: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(error, AppError::Internal(_)));
    }
}
