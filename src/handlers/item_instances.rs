use super::common::ValidatedJson;
use crate::{
    auth::Actor,
    entities::item_instance::{self, InstanceStatus},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateInstanceStatusRequest {
    pub status: InstanceStatus,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}

/// Look a unit up by its barcode
#[utoipa::path(
    get,
    path = "/api/v1/item-instances/barcode/{barcode}",
    params(("barcode" = String, Path, description = "Barcode, e.g. 20240501-CHR01-000001")),
    responses(
        (status = 200, description = "Instance found", body = ApiResponse<item_instance::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown barcode", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "item-instances"
)]
pub async fn get_by_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
    actor: Actor,
) -> ApiResult<item_instance::Model> {
    let instance = state
        .services
        .item_instances
        .get_by_barcode(&actor, &barcode)
        .await?;
    Ok(Json(ApiResponse::success(instance)))
}

#[utoipa::path(
    get,
    path = "/api/v1/item-instances/{id}",
    params(("id" = i32, Path, description = "Instance ID")),
    responses(
        (status = 200, description = "Instance found", body = ApiResponse<item_instance::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "item-instances"
)]
pub async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<item_instance::Model> {
    let instance = state.services.item_instances.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(instance)))
}

/// Change a unit's status at its current office
#[utoipa::path(
    put,
    path = "/api/v1/item-instances/{id}/status",
    params(("id" = i32, Path, description = "Instance ID")),
    request_body = UpdateInstanceStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<item_instance::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Status change not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "item-instances"
)]
pub async fn update_instance_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<UpdateInstanceStatusRequest>,
) -> ApiResult<item_instance::Model> {
    let instance = state
        .services
        .item_instances
        .update_status(&actor, id, payload.status, payload.remarks)
        .await?;
    Ok(Json(ApiResponse::success(instance)))
}
