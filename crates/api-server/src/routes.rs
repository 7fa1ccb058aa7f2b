//! API route definitions.

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::handlers::{admin, auth, health, rfqs};
use crate::middleware::require_auth;
use crate::state::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Global Trade Hub API",
        version = "1.0.0",
        description = "Accounts, RFQ negotiation and order hand-off for the B2B trade marketplace"
    ),
    paths(
        health::health_check,
        health::readiness,
        auth::register,
        auth::login,
        auth::refresh,
        auth::me,
        rfqs::list_my_rfqs,
        rfqs::create_rfq,
        rfqs::list_open_rfqs,
        rfqs::get_rfq,
        rfqs::update_rfq_status,
        rfqs::list_responses,
        rfqs::create_response,
        rfqs::revise_response,
        rfqs::update_response_status,
        admin::list_all_rfqs,
        admin::delete_rfq,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            health::HealthResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::RefreshRequest,
            auth::AuthResponse,
            rfqs::RfqStatusRequest,
            rfqs::ResponseStatusRequest,
            rfqs::DecisionResponse,
            trade_core::User,
            trade_core::Role,
            trade_core::Rfq,
            trade_core::RfqView,
            trade_core::RfqStatus,
            trade_core::RfqResponse,
            trade_core::ResponseStatus,
            trade_core::NewRfq,
            trade_core::NewRfqResponse,
            trade_core::ResponseRevision,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and tokens"),
        (name = "rfqs", description = "Requests for quotation and supplier quotes"),
        (name = "admin", description = "Platform administration"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the main router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/v1/me", get(auth::me))
        // RFQs
        .route("/api/v1/rfqs", get(rfqs::list_my_rfqs).post(rfqs::create_rfq))
        .route("/api/v1/rfqs/open", get(rfqs::list_open_rfqs))
        .route("/api/v1/rfqs/{id}", get(rfqs::get_rfq))
        .route("/api/v1/rfqs/{id}/status", patch(rfqs::update_rfq_status))
        .route("/api/v1/rfqs/{id}/responses", get(rfqs::list_responses))
        // Quotes
        .route("/api/v1/rfqs/responses", post(rfqs::create_response))
        .route("/api/v1/rfqs/responses/{id}", put(rfqs::revise_response))
        .route(
            "/api/v1/rfqs/responses/{id}/status",
            patch(rfqs::update_response_status),
        )
        // Admin
        .route("/api/v1/admin/rfqs", get(admin::list_all_rfqs))
        .route("/api/v1/admin/rfqs/{id}", delete(admin::delete_rfq))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        // Public auth endpoints
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(protected)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("Global Trade Hub API"));
        assert!(json.contains("/api/v1/rfqs/responses"));
        assert!(json.contains("/api/v1/admin/rfqs"));
    }
}
