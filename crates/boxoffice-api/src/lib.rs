//! boxoffice-api - Gateway REST API
//!
//! HTTP layer in front of the [`ServiceRegistry`](boxoffice_gateway::ServiceRegistry).
//! It is transport-agnostic: handlers only see `Arc<dyn ServiceClient>`
//! handles through the registry.
//!
//! # Usage
//!
//! ```ignore
//! use boxoffice_api::{create_router, AppState};
//! use boxoffice_gateway::ServiceRegistry;
//!
//! let registry = ServiceRegistry::with_clients(clients, timeout);
//! let state = AppState::new("gateway", registry);
//! let router = create_router(state);
//! ```

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::{map_rpc_error, normalize_request_failure, ApiError};
pub use extract::ValidatedJson;
pub use state::AppState;

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// CORS policy for a single browser origin that sends credentials
pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT])
}

/// Create the gateway REST API router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = state.cors_origin().cloned().map(cors_layer);

    let router = Router::new()
        // Health
        .route("/health", get(handlers::health::health))
        .route("/health/{service}", get(handlers::health::service_health))
        // Services
        .route("/services", get(handlers::services::list_services))
        .route(
            "/services/{service}/messages",
            post(handlers::services::relay_message),
        )
        .fallback(|| async { ApiError::NotFound("Route not found".to_string()) })
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use boxoffice_core::{RpcError, ServiceClient, PING_PATTERN};
    use boxoffice_gateway::ServiceRegistry;
    use boxoffice_rpc::{ping, LocalClient, MessageRouter, TcpClient};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn catalog() -> Arc<dyn ServiceClient> {
        let router = ping::register(MessageRouter::new("catalog"))
            .route("catalog.find", |id: u64| async move {
                if id == 1 {
                    anyhow::Ok(json!({"id": 1, "title": "Heat"}))
                } else {
                    Err(anyhow::Error::new(
                        RpcError::not_found(format!("Movie {} not found", id))
                            .with_details(json!({"id": id})),
                    ))
                }
            })
            .route("catalog.admin", |_: Value| async move {
                Err::<Value, _>(anyhow::Error::new(RpcError::forbidden("Admins only")))
            })
            .route("catalog.crash", |_: Value| async move {
                Err::<Value, _>(anyhow::anyhow!("database pool exhausted"))
            })
            .route("catalog.slow", |_: Value| async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                anyhow::Ok(Value::Null)
            });
        Arc::new(LocalClient::new(Arc::new(router)))
    }

    fn media() -> Arc<dyn ServiceClient> {
        Arc::new(LocalClient::new(Arc::new(ping::register(
            MessageRouter::new("media"),
        ))))
    }

    /// A TCP client pointed at a port nothing listens on
    fn unreachable(name: &str) -> Arc<dyn ServiceClient> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Arc::new(TcpClient::new(name, "127.0.0.1", port))
    }

    fn app(clients: Vec<Arc<dyn ServiceClient>>) -> Router {
        let registry = ServiceRegistry::with_clients(clients, Duration::from_millis(200));
        create_router(AppState::new("gateway", registry))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read(response).await
    }

    async fn post_json(router: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        read(router.oneshot(request).await.unwrap()).await
    }

    async fn read(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_all_alive() {
        let (status, body) = get_json(app(vec![catalog(), media()]), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["gateway"]["service"], json!("gateway"));
        assert_eq!(body["services"]["catalog"]["ok"], json!(true));
        assert_eq!(
            body["services"]["media"]["message"],
            json!("Service media is alive")
        );
        assert_eq!(body["services"]["media"]["result"]["service"], json!("media"));
    }

    #[tokio::test]
    async fn health_is_200_even_when_a_service_is_down() {
        let (status, body) = get_json(
            app(vec![catalog(), media(), unreachable("search")]),
            "/health",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["services"]["catalog"]["ok"], json!(true));
        assert_eq!(body["services"]["media"]["ok"], json!(true));
        assert_eq!(body["services"]["search"]["ok"], json!(false));
        assert_eq!(
            body["services"]["search"]["message"],
            json!("Service search is not alive")
        );
        assert!(body["services"]["search"]["error"].is_string());
    }

    #[tokio::test]
    async fn single_service_health() {
        let router = app(vec![catalog(), unreachable("search")]);

        let (status, body) = get_json(router.clone(), "/health/catalog").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));

        let (status, body) = get_json(router.clone(), "/health/search").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(false));

        let (status, body) = get_json(router, "/health/tickets").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("not_found"));
    }

    #[tokio::test]
    async fn list_services_sorted() {
        let (status, body) = get_json(app(vec![media(), catalog()]), "/services").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"items": [
                {"name": "catalog", "address": {"transport": "local"}},
                {"name": "media", "address": {"transport": "local"}},
            ]})
        );
    }

    #[tokio::test]
    async fn relay_success() {
        let (status, body) = post_json(
            app(vec![catalog()]),
            "/services/catalog/messages",
            r#"{"pattern": "catalog.find", "data": 1}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": 1, "title": "Heat"}));
    }

    #[tokio::test]
    async fn relay_ping_without_data() {
        let (status, body) = post_json(
            app(vec![media()]),
            "/services/media/messages",
            &format!(r#"{{"pattern": "{}"}}"#, PING_PATTERN),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], json!("media"));
    }

    #[tokio::test]
    async fn relay_maps_rpc_errors_without_details() {
        let router = app(vec![catalog()]);

        let (status, body) = post_json(
            router.clone(),
            "/services/catalog/messages",
            r#"{"pattern": "catalog.find", "data": 7}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "not_found", "message": "Movie 7 not found"}));

        let (status, body) = post_json(
            router.clone(),
            "/services/catalog/messages",
            r#"{"pattern": "catalog.admin"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], json!("Admins only"));

        let (status, body) = post_json(
            router,
            "/services/catalog/messages",
            r#"{"pattern": "catalog.crash"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], json!("Internal Server Error"));
    }

    #[tokio::test]
    async fn relay_bad_payload_is_validation_error() {
        let (status, body) = post_json(
            app(vec![catalog()]),
            "/services/catalog/messages",
            r#"{"pattern": "catalog.find", "data": "not-a-number"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Validation Error"));
    }

    #[tokio::test]
    async fn relay_rejects_invalid_bodies() {
        let router = app(vec![catalog()]);

        for body in [r#"{"pattern": ""}"#, r#"{"data": 1}"#, r#"{"pattern": "#] {
            let (status, reply) =
                post_json(router.clone(), "/services/catalog/messages", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(reply, json!({"error": "bad_request", "message": "Validation Error"}));
        }
    }

    #[tokio::test]
    async fn relay_unknown_service() {
        let (status, body) = post_json(
            app(vec![catalog()]),
            "/services/tickets/messages",
            r#"{"pattern": "tickets.buy"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Service not found: tickets"));
    }

    #[tokio::test]
    async fn relay_unreachable_service_is_503() {
        let (status, body) = post_json(
            app(vec![unreachable("search")]),
            "/services/search/messages",
            r#"{"pattern": "search.query"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], json!("service_unavailable"));
    }

    #[tokio::test]
    async fn relay_slow_service_is_504() {
        let (status, body) = post_json(
            app(vec![catalog()]),
            "/services/catalog/messages",
            r#"{"pattern": "catalog.slow"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], json!("gateway_timeout"));
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, body) = get_json(app(vec![]), "/movies").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("not_found"));
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_with_credentials() {
        let origin = HeaderValue::from_static("http://localhost:5173");
        let state = AppState::new("gateway", ServiceRegistry::new(Duration::from_secs(1)))
            .with_cors_origin(origin.clone());
        let router = create_router(state);

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/health")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        let headers = response.headers();
        assert_eq!(headers.get("access-control-allow-origin"), Some(&origin));
        assert_eq!(
            headers.get("access-control-allow-credentials"),
            Some(&HeaderValue::from_static("true"))
        );
    }
}
