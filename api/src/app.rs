//! Router assembly: routes plus the middleware chain around them.

use axum::{
    http::{header, HeaderValue, Method},
    middleware, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers, observability::request_logger, rate_limit, rate_limit::RateLimitState, routes,
    state::AppState,
};

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Outermost first: CORS, tracing span, rate limiting, request logging.
pub fn build_router(
    state: AppState,
    rate_limiter: RateLimitState,
    allowed_origins: &[String],
) -> Router {
    Router::new()
        .merge(routes::memo_routes(state.clone()))
        .merge(routes::health_routes())
        .merge(routes::observability_routes())
        .fallback(handlers::route_not_found)
        .layer(middleware::from_fn(request_logger))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{test_support::*, AuthManager};
    use crate::rate_limit::RateLimitConfig;
    use crate::validation::QueryValidator;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use chrono::Duration;
    use prometheus::Registry;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://localhost:1/memos_test")
            .expect("lazy pool");
        let registry = Registry::new_custom(Some("test".into()), None).unwrap();
        crate::metrics::register_all(&registry).unwrap();
        AppState::new(
            pool,
            registry,
            QueryValidator::new().unwrap(),
            AuthManager::new(TEST_SECRET),
        )
    }

    fn test_app() -> Router {
        build_router(
            test_state(),
            RateLimitState::new(RateLimitConfig::default()),
            &["http://localhost:3000".to_string()],
        )
    }

    async fn send(request: Request<Body>) -> Response {
        test_app().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn hostile_search_is_rejected_before_the_database() {
        let response = send(get("/api/memos?q=x%27%20OR%201%3D1%20--")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "ValidationError");
        assert_eq!(body["errors"][0]["field"], "q");
        assert_eq!(
            body["errors"][0]["message"],
            "dangerous pattern detected in search query"
        );
    }

    #[tokio::test]
    async fn nul_in_search_is_a_client_error() {
        let response = send(get("/api/memos?q=a%00b")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["field"], "q");
        assert_eq!(
            body["errors"][0]["message"],
            "search query must not contain control characters"
        );
    }

    #[tokio::test]
    async fn invalid_order_by_names_the_column() {
        let response = send(get("/api/memos?order_by=password%20desc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["field"], "order_by");
        assert_eq!(
            body["errors"][0]["message"],
            "invalid column for ordering: password"
        );
    }

    #[tokio::test]
    async fn out_of_range_pagination_is_rejected() {
        let response = send(get("/api/memos?limit=1001")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(get("/api/memos/search?keyword=notes&offset=100001")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["field"], "offset");
    }

    #[tokio::test]
    async fn malformed_query_string_is_a_bad_request() {
        let response = send(get("/api/memos?limit=lots")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "InvalidQuery");
    }

    #[tokio::test]
    async fn keyword_with_nothing_searchable_returns_empty_page() {
        let response = send(get("/api/memos/search?keyword=%27%3B--")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["items"], serde_json::json!([]));
        assert_eq!(body["limit"], 20);
    }

    #[tokio::test]
    async fn invalid_memo_id_is_a_bad_request() {
        let response = send(get("/api/memos/not-a-uuid")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "InvalidPath");
    }

    #[tokio::test]
    async fn writes_require_a_bearer_token() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/memos")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"hello"}"#))
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "missing_bearer_token");

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/memos/3f6c1f7e-8a52-4c1b-9a8e-0f6f3f0f9b11")
            .header("authorization", "Bearer nonsense")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "invalid_token");
    }

    #[tokio::test]
    async fn authenticated_write_still_validates_body() {
        let token = token_for("alice", TEST_SECRET, Duration::hours(1));
        let request = Request::builder()
            .method("POST")
            .uri("/api/memos")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(r#"{"title":"   ","priority":9}"#))
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"priority"));
    }

    #[tokio::test]
    async fn responses_carry_rate_limit_headers() {
        let response = send(get("/api/memos?limit=0")).await;
        assert!(response.headers().contains_key("x-ratelimit-limit"));
        assert!(response.headers().contains_key("x-ratelimit-remaining"));
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/memos")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_prometheus_text() {
        let _ = send(get("/api/memos?order_by=nope")).await;

        let response = send(get("/metrics")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE test_http_requests_total counter"));
        assert!(text.contains("test_query_validation_rejections_total"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let response = send(get("/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
