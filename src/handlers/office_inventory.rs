use super::common::{PageQuery, ValidatedJson};
use crate::{
    auth::Actor,
    entities::{item_instance, office_inventory},
    services::office_inventory::{AdjustInventoryInput, AdjustmentResult},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuantity {
    pub office_id: i32,
    pub item_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdjustInventoryRequest {
    pub office_id: i32,
    pub item_id: i32,
    /// Signed change; negative values remove stock
    pub delta: i32,
    #[validate(length(min = 1, max = 500, message = "A reason is required"))]
    pub reason: String,
}

/// Stock held by the caller's own office
#[utoipa::path(
    get,
    path = "/api/v1/office-inventory/my-office",
    responses(
        (status = 200, description = "Inventory of the caller's office", body = ApiResponse<Vec<office_inventory::Model>>),
        (status = 400, description = "Caller has no office", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-inventory"
)]
pub async fn my_office_inventory(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Vec<office_inventory::Model>> {
    let service = &state.services.office_inventory;
    let office_id = service.own_office(&actor)?;
    let entries = service.by_office(&actor, office_id).await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// Barcoded units currently at the caller's office
#[utoipa::path(
    get,
    path = "/api/v1/office-inventory/my-office/item-instances",
    params(PageQuery),
    responses(
        (status = 200, description = "Instances at the caller's office", body = ApiResponse<PaginatedResponse<item_instance::Model>>),
        (status = 400, description = "Caller has no office", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-inventory"
)]
pub async fn my_office_instances(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<PaginatedResponse<item_instance::Model>> {
    let office_id = state.services.office_inventory.own_office(&actor)?;
    office_instances_page(&state, &actor, office_id, query).await
}

/// Stock held by one office
#[utoipa::path(
    get,
    path = "/api/v1/office-inventory/office/{office_id}",
    params(("office_id" = i32, Path, description = "Office ID")),
    responses(
        (status = 200, description = "Inventory of the office", body = ApiResponse<Vec<office_inventory::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-inventory"
)]
pub async fn office_inventory(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    actor: Actor,
) -> ApiResult<Vec<office_inventory::Model>> {
    let entries = state
        .services
        .office_inventory
        .by_office(&actor, office_id)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// Barcoded units currently at one office
#[utoipa::path(
    get,
    path = "/api/v1/office-inventory/office/{office_id}/item-instances",
    params(("office_id" = i32, Path, description = "Office ID"), PageQuery),
    responses(
        (status = 200, description = "Instances at the office", body = ApiResponse<PaginatedResponse<item_instance::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-inventory"
)]
pub async fn office_instances(
    State(state): State<AppState>,
    Path(office_id): Path<i32>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<PaginatedResponse<item_instance::Model>> {
    office_instances_page(&state, &actor, office_id, query).await
}

async fn office_instances_page(
    state: &AppState,
    actor: &Actor,
    office_id: i32,
    query: PageQuery,
) -> ApiResult<PaginatedResponse<item_instance::Model>> {
    let (page, limit) = query.resolve(&state.config);
    let (items, total) = state
        .services
        .item_instances
        .list_by_office(actor, office_id, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

/// How many units of an item one office holds
#[utoipa::path(
    get,
    path = "/api/v1/office-inventory/office/{office_id}/item/{item_id}",
    params(
        ("office_id" = i32, Path, description = "Office ID"),
        ("item_id" = i32, Path, description = "Item ID"),
    ),
    responses(
        (status = 200, description = "Quantity on hand", body = ApiResponse<ItemQuantity>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-inventory"
)]
pub async fn office_item_quantity(
    State(state): State<AppState>,
    Path((office_id, item_id)): Path<(i32, i32)>,
    actor: Actor,
) -> ApiResult<ItemQuantity> {
    let quantity = state
        .services
        .office_inventory
        .quantity(&actor, office_id, item_id)
        .await?;
    Ok(Json(ApiResponse::success(ItemQuantity {
        office_id,
        item_id,
        quantity,
    })))
}

/// Stock of one item per office
#[utoipa::path(
    get,
    path = "/api/v1/office-inventory/item/{item_id}",
    params(("item_id" = i32, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Per-office stock of the item", body = ApiResponse<Vec<office_inventory::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-inventory"
)]
pub async fn item_inventory(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
    actor: Actor,
) -> ApiResult<Vec<office_inventory::Model>> {
    let entries = state
        .services
        .office_inventory
        .by_item(&actor, item_id)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// Manual stock correction
#[utoipa::path(
    post,
    path = "/api/v1/office-inventory/adjust",
    request_body = AdjustInventoryRequest,
    responses(
        (status = 200, description = "Inventory adjusted", body = ApiResponse<AdjustmentResult>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 422, description = "Adjustment would make stock negative", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "office-inventory"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<AdjustInventoryRequest>,
) -> ApiResult<AdjustmentResult> {
    let result = state
        .services
        .office_inventory
        .adjust(
            &actor,
            AdjustInventoryInput {
                office_id: payload.office_id,
                item_id: payload.item_id,
                delta: payload.delta,
                reason: payload.reason,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
