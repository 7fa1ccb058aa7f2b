//! RFQ and quote handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use trade_core::{
    NewRfq, NewRfqResponse, ResponseRevision, ResponseStatus, RfqResponse, RfqStatus, RfqView,
};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::handlers::{rfq_views, Page, PageQuery};
use crate::middleware::{gate, Authorized};
use crate::state::AppState;

/// RFQ status change request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RfqStatusRequest {
    /// `closed` or `cancelled`.
    pub status: RfqStatus,
}

/// Quote decision request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResponseStatusRequest {
    /// `accepted`, `rejected` or `countered`.
    pub status: ResponseStatus,
}

/// Outcome of a decision on a quote.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub response: RfqResponse,
    /// Order created for an accepted quote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
}

/// List the caller's own RFQs.
#[utoipa::path(
    get,
    path = "/api/v1/rfqs",
    params(PageQuery),
    responses(
        (status = 200, description = "RFQs owned by the caller", body = Page<RfqView>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn list_my_rfqs(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::ListOwnRfqs>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<RfqView>>> {
    let page = query.pagination();
    let rfqs = state.rfqs.list_mine(&auth.actor(), page).await?;
    Ok(Json(Page::new(rfq_views(rfqs), page)))
}

/// Create an RFQ. It is active immediately.
#[utoipa::path(
    post,
    path = "/api/v1/rfqs",
    request_body = NewRfq,
    responses(
        (status = 201, description = "RFQ created", body = RfqView),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Buyers only", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn create_rfq(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::CreateRfq>,
    ApiJson(input): ApiJson<NewRfq>,
) -> ApiResult<(StatusCode, Json<RfqView>)> {
    let rfq = state.rfqs.create_rfq(&auth.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(rfq.into())))
}

/// Supplier inbox: open RFQs the caller may quote on.
#[utoipa::path(
    get,
    path = "/api/v1/rfqs/open",
    params(PageQuery),
    responses(
        (status = 200, description = "Open RFQs", body = Page<RfqView>),
        (status = 403, description = "Suppliers and admins only", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn list_open_rfqs(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::ListOpenRfqs>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<RfqView>>> {
    let page = query.pagination();
    let rfqs = state.rfqs.list_open_for_supplier(&auth.actor(), page).await?;
    Ok(Json(Page::new(rfq_views(rfqs), page)))
}

/// Fetch one RFQ.
#[utoipa::path(
    get,
    path = "/api/v1/rfqs/{id}",
    params(("id" = Uuid, Path, description = "RFQ ID")),
    responses(
        (status = 200, description = "RFQ", body = RfqView),
        (status = 404, description = "Not found or not visible", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn get_rfq(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::ViewRfq>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<RfqView>> {
    let rfq = state.rfqs.get_by_id(&auth.actor(), id).await?;
    Ok(Json(rfq.into()))
}

/// Close or cancel an RFQ.
#[utoipa::path(
    patch,
    path = "/api/v1/rfqs/{id}/status",
    params(("id" = Uuid, Path, description = "RFQ ID")),
    request_body = RfqStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = RfqView),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn update_rfq_status(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::UpdateRfqStatus>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RfqStatusRequest>,
) -> ApiResult<Json<RfqView>> {
    let rfq = state.rfqs.update_status(&auth.actor(), id, req.status).await?;
    Ok(Json(rfq.into()))
}

/// List quotes on an RFQ. Suppliers only see their own.
#[utoipa::path(
    get,
    path = "/api/v1/rfqs/{id}/responses",
    params(("id" = Uuid, Path, description = "RFQ ID")),
    responses(
        (status = 200, description = "Quotes, newest first", body = Vec<RfqResponse>),
        (status = 404, description = "RFQ not found or not visible", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn list_responses(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::ListResponses>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<RfqResponse>>> {
    let responses = state.rfqs.list_responses(&auth.actor(), id).await?;
    Ok(Json(responses))
}

/// Submit a quote.
#[utoipa::path(
    post,
    path = "/api/v1/rfqs/responses",
    request_body = NewRfqResponse,
    responses(
        (status = 201, description = "Quote submitted", body = RfqResponse),
        (status = 403, description = "Suppliers only", body = crate::error::ErrorResponse),
        (status = 409, description = "RFQ closed or quote already open", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn create_response(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::CreateResponse>,
    ApiJson(input): ApiJson<NewRfqResponse>,
) -> ApiResult<(StatusCode, Json<RfqResponse>)> {
    let response = state.rfqs.create_response(&auth.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Revise a pending or countered quote.
#[utoipa::path(
    put,
    path = "/api/v1/rfqs/responses/{id}",
    params(("id" = Uuid, Path, description = "Quote ID")),
    request_body = ResponseRevision,
    responses(
        (status = 200, description = "Quote revised", body = RfqResponse),
        (status = 409, description = "Quote already decided", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn revise_response(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::ReviseResponse>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(revision): ApiJson<ResponseRevision>,
) -> ApiResult<Json<RfqResponse>> {
    let response = state.rfqs.revise_response(&auth.actor(), id, revision).await?;
    Ok(Json(response))
}

/// Accept, reject or counter a quote. Acceptance creates an order.
#[utoipa::path(
    patch,
    path = "/api/v1/rfqs/responses/{id}/status",
    params(("id" = Uuid, Path, description = "Quote ID")),
    request_body = ResponseStatusRequest,
    responses(
        (status = 200, description = "Decision recorded", body = DecisionResponse),
        (status = 403, description = "Not the RFQ owner", body = crate::error::ErrorResponse),
        (status = 409, description = "Quote not pending or RFQ closed", body = crate::error::ErrorResponse),
    ),
    tag = "rfqs"
)]
pub async fn update_response_status(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::DecideResponse>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ResponseStatusRequest>,
) -> ApiResult<Json<DecisionResponse>> {
    let decision = state
        .rfqs
        .update_response_status(&auth.actor(), id, req.status)
        .await?;

    Ok(Json(DecisionResponse {
        response: decision.response,
        order_id: decision.order_id,
    }))
}
