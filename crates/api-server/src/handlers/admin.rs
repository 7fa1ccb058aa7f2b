//! Admin-only RFQ handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use trade_core::RfqView;

use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery};
use crate::handlers::{rfq_views, Page, PageQuery};
use crate::middleware::{gate, Authorized};
use crate::state::AppState;

/// List every RFQ on the platform.
#[utoipa::path(
    get,
    path = "/api/v1/admin/rfqs",
    params(PageQuery),
    responses(
        (status = 200, description = "All RFQs, newest first", body = Page<RfqView>),
        (status = 403, description = "Admins only", body = crate::error::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn list_all_rfqs(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::AdminListRfqs>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<RfqView>>> {
    let page = query.pagination();
    let rfqs = state.rfqs.list_all(&auth.actor(), page).await?;
    Ok(Json(Page::new(rfq_views(rfqs), page)))
}

/// Permanently delete an RFQ and its quotes.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/rfqs/{id}",
    params(("id" = Uuid, Path, description = "RFQ ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Admins only", body = crate::error::ErrorResponse),
        (status = 404, description = "RFQ not found", body = crate::error::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn delete_rfq(
    State(state): State<Arc<AppState>>,
    auth: Authorized<gate::AdminDeleteRfq>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.rfqs.delete_rfq(&auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
