use super::common::{PageQuery, ValidatedJson};
use crate::{
    auth::Actor,
    entities::{office, office_transaction},
    errors::ServiceError,
    services::office_distribution::{MovementInput, TransactionPage},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

type TransactionList = PaginatedResponse<office_transaction::Model>;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DistributeRequest {
    pub item_id: i32,
    pub from_office_id: i32,
    pub to_office_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    pub initiated_by_user_id: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReturnRequest {
    pub item_id: i32,
    pub from_office_id: i32,
    pub to_office_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    #[validate(length(max = 500))]
    pub return_reason: Option<String>,
    pub initiated_by_user_id: i32,
}

/// Hand stock to a direct child office
#[utoipa::path(
    post,
    path = "/api/v1/office-distributions/distribute",
    request_body = DistributeRequest,
    responses(
        (status = 201, description = "Stock distributed", body = ApiResponse<office_transaction::Model>),
        (status = 400, description = "Invalid request or not a child office", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn distribute(
    State(state): State<AppState>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<DistributeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<office_transaction::Model>>), ServiceError> {
    let row = state
        .services
        .office_distribution
        .distribute(
            &actor,
            MovementInput {
                item_id: payload.item_id,
                from_office_id: payload.from_office_id,
                to_office_id: payload.to_office_id,
                quantity: payload.quantity,
                remarks: payload.remarks,
                initiated_by_user_id: payload.initiated_by_user_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(row))))
}

/// Send stock back to the direct parent office
#[utoipa::path(
    post,
    path = "/api/v1/office-distributions/return",
    request_body = ReturnRequest,
    responses(
        (status = 201, description = "Stock returned", body = ApiResponse<office_transaction::Model>),
        (status = 400, description = "Invalid request or not the parent office", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn return_to_parent(
    State(state): State<AppState>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<ReturnRequest>,
) -> Result<(StatusCode, Json<ApiResponse<office_transaction::Model>>), ServiceError> {
    let row = state
        .services
        .office_distribution
        .return_to_parent(
            &actor,
            MovementInput {
                item_id: payload.item_id,
                from_office_id: payload.from_office_id,
                to_office_id: payload.to_office_id,
                quantity: payload.quantity,
                remarks: payload.remarks,
                initiated_by_user_id: payload.initiated_by_user_id,
            },
            payload.return_reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(row))))
}

fn page_of(
    (items, total): TransactionPage,
    page: u64,
    limit: u64,
) -> Json<ApiResponse<TransactionList>> {
    Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    )))
}

/// Every audit row touching an office
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/office/{office_id}/transactions",
    params(("office_id" = i32, Path, description = "Office ID"), PageQuery),
    responses(
        (status = 200, description = "Transactions", body = ApiResponse<PaginatedResponse<office_transaction::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn office_transactions(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<TransactionList> {
    let (page, limit) = query.resolve(&state.config);
    let rows = state
        .services
        .office_distribution
        .transactions(&actor, office_id, page, limit)
        .await?;
    Ok(page_of(rows, page, limit))
}

/// PENDING audit rows touching an office
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/office/{office_id}/pending",
    params(("office_id" = i32, Path, description = "Office ID"), PageQuery),
    responses(
        (status = 200, description = "Pending transactions", body = ApiResponse<PaginatedResponse<office_transaction::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn pending_transactions(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<TransactionList> {
    let (page, limit) = query.resolve(&state.config);
    let rows = state
        .services
        .office_distribution
        .pending(&actor, office_id, page, limit)
        .await?;
    Ok(page_of(rows, page, limit))
}

/// Distributions sent out by an office
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/office/{office_id}/distribution-history",
    params(("office_id" = i32, Path, description = "Office ID"), PageQuery),
    responses(
        (status = 200, description = "Distribution history", body = ApiResponse<PaginatedResponse<office_transaction::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn distribution_history(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<TransactionList> {
    let (page, limit) = query.resolve(&state.config);
    let rows = state
        .services
        .office_distribution
        .distribution_history(&actor, office_id, page, limit)
        .await?;
    Ok(page_of(rows, page, limit))
}

/// Returns sent back by an office
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/office/{office_id}/return-history",
    params(("office_id" = i32, Path, description = "Office ID"), PageQuery),
    responses(
        (status = 200, description = "Return history", body = ApiResponse<PaginatedResponse<office_transaction::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn return_history(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<TransactionList> {
    let (page, limit) = query.resolve(&state.config);
    let rows = state
        .services
        .office_distribution
        .return_history(&actor, office_id, page, limit)
        .await?;
    Ok(page_of(rows, page, limit))
}

/// Direct children of an office
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/office/{office_id}/children",
    params(("office_id" = i32, Path, description = "Office ID")),
    responses(
        (status = 200, description = "Child offices", body = ApiResponse<Vec<office::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn child_offices(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    actor: Actor,
) -> ApiResult<Vec<office::Model>> {
    let children = state
        .services
        .office_distribution
        .children(&actor, office_id)
        .await?;
    Ok(Json(ApiResponse::success(children)))
}

/// Parent of an office; `data` is null for a root office
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/office/{office_id}/parent",
    params(("office_id" = i32, Path, description = "Office ID")),
    responses(
        (status = 200, description = "Parent office", body = ApiResponse<office::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn parent_office(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    actor: Actor,
) -> ApiResult<Option<office::Model>> {
    let parent = state
        .services
        .office_distribution
        .parent(&actor, office_id)
        .await?;
    Ok(Json(ApiResponse::success(parent)))
}

/// Movement history of one item
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/item/{item_id}/history",
    params(("item_id" = i32, Path, description = "Item ID"), PageQuery),
    responses(
        (status = 200, description = "Item history", body = ApiResponse<PaginatedResponse<office_transaction::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn item_history(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<TransactionList> {
    let (page, limit) = query.resolve(&state.config);
    let rows = state
        .services
        .office_distribution
        .item_history(&actor, item_id, page, limit)
        .await?;
    Ok(page_of(rows, page, limit))
}

/// One audit row by its reference number
#[utoipa::path(
    get,
    path = "/api/v1/office-distributions/reference/{reference_number}",
    params(("reference_number" = String, Path, description = "Reference number, e.g. DIST-20240501093015-3fa2c1d9")),
    responses(
        (status = 200, description = "Transaction found", body = ApiResponse<office_transaction::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-distributions"
)]
pub async fn transaction_by_reference(
    State(state): State<AppState>,
    Path(reference_number): Path<String>,
    actor: Actor,
) -> ApiResult<office_transaction::Model> {
    let row = state
        .services
        .office_distribution
        .by_reference(&actor, &reference_number)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}
