use super::common::{parse_date, parse_optional_timestamp, ValidatedJson};
use crate::{
    auth::Actor,
    entities::{
        item_instance,
        transfer::{self, TransferStatus, TransferType},
    },
    errors::ServiceError,
    services::transfers::{CreateTransferInput, Direction, EditTransferInput, TransferFilter},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateDistributionRequest {
    pub item_id: i32,
    pub from_office_id: i32,
    pub to_office_id: i32,
    /// User the request is filed for; defaults to the caller
    pub user_id: Option<i32>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// `YYYY-MM-DD` or RFC 3339; defaults to now
    pub date_distributed: Option<String>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    #[serde(default)]
    pub transfer_type: TransferType,
    /// Serialized units travelling with the transfer
    #[serde(default)]
    pub instance_ids: Vec<i32>,
}

/// The only fields a PENDING transfer may change. Anything else, status
/// included, is rejected as an unknown field.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateDistributionRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub date_distributed: Option<String>,
    /// An empty string clears the remarks; omit the field to keep them.
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RejectDistributionRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[into_params(parameter_in = Query)]
pub struct DistributionListQuery {
    /// incoming, outgoing or all (default)
    #[serde(default)]
    pub direction: Direction,
    pub status: Option<TransferStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    /// First day, inclusive
    pub start_date: String,
    /// Last day, inclusive
    pub end_date: String,
}

/// List transfers visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/distributions",
    params(DistributionListQuery),
    responses(
        (status = 200, description = "Transfers retrieved", body = ApiResponse<PaginatedResponse<transfer::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn list_distributions(
    State(state): State<AppState>,
    Query(query): Query<DistributionListQuery>,
    actor: Actor,
) -> ApiResult<PaginatedResponse<transfer::Model>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(query.limit);
    let (items, total) = state
        .services
        .transfers
        .list(
            &actor,
            TransferFilter {
                direction: query.direction,
                status: query.status,
                page,
                limit,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

/// The ten most recent transfers visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/distributions/recent",
    responses(
        (status = 200, description = "Recent transfers", body = ApiResponse<Vec<transfer::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn recent_distributions(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Vec<transfer::Model>> {
    let transfers = state.services.transfers.recent(&actor).await?;
    Ok(Json(ApiResponse::success(transfers)))
}

/// Transfers distributed within an inclusive date range
#[utoipa::path(
    get,
    path = "/api/v1/distributions/date-range",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Transfers in range", body = ApiResponse<Vec<transfer::Model>>),
        (status = 400, description = "Invalid dates", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn distributions_by_date_range(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
    actor: Actor,
) -> ApiResult<Vec<transfer::Model>> {
    let start = parse_date("startDate", &query.start_date)?;
    let end = parse_date("endDate", &query.end_date)?;
    let transfers = state
        .services
        .transfers
        .by_date_range(&actor, start, end)
        .await?;
    Ok(Json(ApiResponse::success(transfers)))
}

/// Get one transfer
#[utoipa::path(
    get,
    path = "/api/v1/distributions/{id}",
    params(("id" = i32, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Transfer found", body = ApiResponse<transfer::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn get_distribution(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<transfer::Model> {
    let transfer = state.services.transfers.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Barcoded units attached to a transfer
#[utoipa::path(
    get,
    path = "/api/v1/distributions/{id}/barcodes",
    params(("id" = i32, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Attached instances", body = ApiResponse<Vec<item_instance::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn distribution_barcodes(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<Vec<item_instance::Model>> {
    let instances = state.services.transfers.barcodes(&actor, id).await?;
    Ok(Json(ApiResponse::success(instances)))
}

/// File a transfer request; stock is reserved at the source office
#[utoipa::path(
    post,
    path = "/api/v1/distributions",
    request_body = CreateDistributionRequest,
    responses(
        (status = 201, description = "Transfer created", body = ApiResponse<transfer::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Office or item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn create_distribution(
    State(state): State<AppState>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<CreateDistributionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<transfer::Model>>), ServiceError> {
    let input = CreateTransferInput {
        item_id: payload.item_id,
        from_office_id: payload.from_office_id,
        to_office_id: payload.to_office_id,
        quantity: payload.quantity,
        initiated_by_user_id: payload.user_id,
        transfer_type: payload.transfer_type,
        remarks: payload.remarks,
        date_distributed: parse_optional_timestamp(
            "dateDistributed",
            payload.date_distributed.as_deref(),
        )?,
        instance_ids: payload.instance_ids,
    };
    let transfer = state.services.transfers.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(transfer))))
}

/// Edit a PENDING transfer
#[utoipa::path(
    put,
    path = "/api/v1/distributions/{id}",
    params(("id" = i32, Path, description = "Transfer ID")),
    request_body = UpdateDistributionRequest,
    responses(
        (status = 200, description = "Transfer updated", body = ApiResponse<transfer::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transfer is no longer pending", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn update_distribution(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<UpdateDistributionRequest>,
) -> ApiResult<transfer::Model> {
    let input = EditTransferInput {
        quantity: payload.quantity,
        date_distributed: parse_optional_timestamp(
            "dateDistributed",
            payload.date_distributed.as_deref(),
        )?,
        remarks: payload.remarks,
    };
    let transfer = state.services.transfers.edit(&actor, id, input).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Delete a transfer; a PENDING one gives its reservation back first
#[utoipa::path(
    delete,
    path = "/api/v1/distributions/{id}",
    params(("id" = i32, Path, description = "Transfer ID")),
    responses(
        (status = 204, description = "Transfer deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn delete_distribution(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> Result<StatusCode, ServiceError> {
    state.services.transfers.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Destination office approves; stock is credited there
#[utoipa::path(
    put,
    path = "/api/v1/distributions/{id}/approve",
    params(("id" = i32, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Transfer completed", body = ApiResponse<transfer::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transfer is no longer pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn approve_distribution(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<transfer::Model> {
    let transfer = state.services.transfers.approve(&actor, id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Destination office accepts; same outcome as approve
#[utoipa::path(
    put,
    path = "/api/v1/distributions/{id}/accept",
    params(("id" = i32, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Transfer completed", body = ApiResponse<transfer::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transfer is no longer pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn accept_distribution(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<transfer::Model> {
    let transfer = state.services.transfers.accept(&actor, id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Destination office declines; the source gets its stock back
#[utoipa::path(
    put,
    path = "/api/v1/distributions/{id}/reject",
    params(("id" = i32, Path, description = "Transfer ID")),
    request_body(content = RejectDistributionRequest, description = "Optional; may be empty"),
    responses(
        (status = 200, description = "Transfer rejected", body = ApiResponse<transfer::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transfer is no longer pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn reject_distribution(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
    body: Bytes,
) -> ApiResult<transfer::Model> {
    // The body is optional, so an empty one is not a rejection.
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        RejectDistributionRequest::default()
    } else {
        let payload: RejectDistributionRequest = serde_json::from_slice(&body)
            .map_err(|e| ServiceError::ValidationError(format!("Invalid JSON body: {}", e)))?;
        payload.validate()?;
        payload
    };
    let transfer = state
        .services
        .transfers
        .reject(&actor, id, payload.reason)
        .await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Withdraw a PENDING transfer
#[utoipa::path(
    put,
    path = "/api/v1/distributions/{id}/cancel",
    params(("id" = i32, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Transfer cancelled", body = ApiResponse<transfer::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transfer is no longer pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "distributions"
)]
pub async fn cancel_distribution(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<transfer::Model> {
    let transfer = state.services.transfers.cancel(&actor, id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}
