//! API Server
//!
//! REST API for the global trade hub.
//!
//! # Features
//!
//! - **Accounts**: registration, login, token refresh, identity lookup
//! - **RFQs**: buyer requests, supplier quotes, decisions and order hand-off
//! - **OpenAPI**: document served at `/api-docs/openapi.json`
//! - **Authentication**: bearer tokens with per-operation role gates
//!
//! # Example
//!
//! ```ignore
//! use api_server::{ApiServer, AppState};
//!
//! let state = AppState::new(&config, pool)?;
//! ApiServer::new(config.server.clone(), state).run().await?;
//! ```

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;

use axum::http::{Request, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, Level};
use trade_core::config::ServerSettings;

/// The timeout layer answers with a bare 408; give it the usual error body.
async fn timeout_error_body(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError::Timeout.into_response();
    }
    response
}

/// Build the router with its middleware stack.
pub fn build_app(state: Arc<AppState>, settings: &ServerSettings) -> Router {
    let cors = if settings.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    create_router(state)
        .layer(TimeoutLayer::new(settings.request_timeout()))
        .layer(map_response(timeout_error_body))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The API server.
pub struct ApiServer {
    settings: ServerSettings,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(settings: ServerSettings, state: AppState) -> Self {
        Self {
            settings,
            state: Arc::new(state),
        }
    }

    /// Run the server until ctrl-c.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.settings.socket_addr()?;
        let app = build_app(self.state, &self.settings);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use trade_core::config::AppConfig;

    fn app() -> Router {
        let config = AppConfig::test_config();
        let state = Arc::new(AppState::in_memory(&config).unwrap());
        build_app(state, &config.server)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn register(app: &Router, email: &str, role: &str) -> String {
        let (status, body) = send(
            app,
            post_json(
                "/api/v1/auth/register",
                None,
                json!({
                    "email": email,
                    "password": "correct-horse-battery",
                    "fullName": "Test User",
                    "role": role,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unauthenticated_list_is_401() {
        let (status, body) = send(&app(), get("/api/v1/rfqs", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_authorization_is_401() {
        let app = app();
        let request = Request::builder()
            .uri("/api/v1/rfqs")
            .header("authorization", "Token abc")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, get("/api/v1/rfqs", Some("not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_buyer_creates_rfq() {
        let app = app();
        let token = register(&app, "buyer@example.com", "buyer").await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/rfqs",
                Some(&token),
                json!({ "quantity": 200, "unit": "piece", "currency": "USD" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["status"], "active");
        assert!(body["expiresAt"].is_string());

        let (status, body) = send(&app, get("/api/v1/rfqs", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["limit"], 20);
    }

    #[tokio::test]
    async fn test_buyer_cannot_submit_response() {
        let app = app();
        let token = register(&app, "buyer@example.com", "buyer").await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/rfqs/responses",
                Some(&token),
                json!({
                    "rfqId": uuid::Uuid::new_v4(),
                    "unitPrice": "185.00",
                    "moq": 150,
                    "estimatedDelivery": 21,
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_supplier_quote_total() {
        let app = app();
        let buyer = register(&app, "buyer@example.com", "buyer").await;
        let supplier = register(&app, "supplier@example.com", "supplier").await;

        let (_, rfq) = send(
            &app,
            post_json(
                "/api/v1/rfqs",
                Some(&buyer),
                json!({ "quantity": 200, "unit": "piece", "currency": "USD" }),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/rfqs/responses",
                Some(&supplier),
                json!({
                    "rfqId": rfq["id"],
                    "unitPrice": "185.00",
                    "moq": 150,
                    "estimatedDelivery": 21,
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["totalPrice"], "27750.00");
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn test_admin_route_requires_admin() {
        let app = app();
        let buyer = register(&app, "buyer@example.com", "buyer").await;

        let (status, _) = send(&app, get("/api/v1/admin/rfqs", Some(&buyer))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, session) = send(
            &app,
            post_json(
                "/api/v1/auth/login",
                None,
                json!({ "email": "root@trade-hub.test", "password": "root-password-123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let admin = session["token"].as_str().unwrap();

        let (status, body) = send(&app, get("/api/v1/admin/rfqs", Some(admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["items"].is_array());
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn test_bad_path_id_is_400() {
        let app = app();
        let token = register(&app, "buyer@example.com", "buyer").await;

        let (status, _) = send(&app, get("/api/v1/rfqs/not-a-uuid", Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_timeout_has_json_body() {
        let mut config = AppConfig::test_config();
        config.server.request_timeout_secs = 0;
        let state = Arc::new(AppState::in_memory(&config).unwrap());
        let app = build_app(state, &config.server);

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/auth/register",
                None,
                json!({
                    "email": "slow@example.com",
                    "password": "correct-horse-battery",
                    "fullName": "Slow User",
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["code"], "TIMEOUT");
        assert_eq!(body["error"], "request timed out");
    }

    #[tokio::test]
    async fn test_rfq_body_carries_expiry_flag() {
        let app = app();
        let token = register(&app, "buyer@example.com", "buyer").await;

        let (_, rfq) = send(
            &app,
            post_json(
                "/api/v1/rfqs",
                Some(&token),
                json!({ "quantity": 200, "unit": "piece", "currency": "USD" }),
            ),
        )
        .await;
        assert_eq!(rfq["isExpired"], false);

        let (status, body) = send(
            &app,
            get(&format!("/api/v1/rfqs/{}", rfq["id"].as_str().unwrap()), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isExpired"], false);
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn test_sub_cent_price_is_400() {
        let app = app();
        let buyer = register(&app, "buyer@example.com", "buyer").await;
        let supplier = register(&app, "supplier@example.com", "supplier").await;

        let (_, rfq) = send(
            &app,
            post_json(
                "/api/v1/rfqs",
                Some(&buyer),
                json!({ "quantity": 200, "unit": "piece", "currency": "USD" }),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/rfqs/responses",
                Some(&supplier),
                json!({
                    "rfqId": rfq["id"],
                    "unitPrice": "0.001",
                    "moq": 150,
                    "estimatedDelivery": 21,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_openapi_served() {
        let (status, body) = send(&app(), get("/api-docs/openapi.json", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "Global Trade Hub API");
    }
}
