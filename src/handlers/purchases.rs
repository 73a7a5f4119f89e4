use super::common::{parse_optional_timestamp, ValidatedJson};
use crate::{
    auth::Actor,
    entities::{item_instance, purchase},
    errors::ServiceError,
    services::purchases::{PurchaseDetail, PurchaseLineInput, ReceivePurchaseInput},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PurchaseLineRequest {
    pub item_id: i32,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
    #[schema(value_type = String, example = "45.00")]
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReceivePurchaseRequest {
    pub office_id: i32,
    #[validate(length(max = 200))]
    pub vendor_name: Option<String>,
    #[validate(length(max = 100))]
    pub invoice_number: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339; defaults to now
    pub purchased_at: Option<String>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    #[validate]
    pub lines: Vec<PurchaseLineRequest>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[into_params(parameter_in = Query)]
pub struct PurchaseListQuery {
    /// Receiving office; defaults to the caller's own
    pub office_id: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Receive purchased stock into an office
#[utoipa::path(
    post,
    path = "/api/v1/purchases",
    request_body = ReceivePurchaseRequest,
    responses(
        (status = 201, description = "Purchase received", body = ApiResponse<PurchaseDetail>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Office or item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "purchases"
)]
pub async fn receive_purchase(
    State(state): State<AppState>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<ReceivePurchaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PurchaseDetail>>), ServiceError> {
    let input = ReceivePurchaseInput {
        office_id: payload.office_id,
        vendor_name: payload.vendor_name,
        invoice_number: payload.invoice_number,
        purchased_at: parse_optional_timestamp("purchasedAt", payload.purchased_at.as_deref())?,
        remarks: payload.remarks,
        lines: payload
            .lines
            .into_iter()
            .map(|line| PurchaseLineInput {
                item_id: line.item_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect(),
    };
    let detail = state.services.purchases.receive(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(detail))))
}

/// A purchase with its lines and the units it brought in
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}",
    params(("id" = i32, Path, description = "Purchase ID")),
    responses(
        (status = 200, description = "Purchase found", body = ApiResponse<PurchaseDetail>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "purchases"
)]
pub async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<PurchaseDetail> {
    let detail = state.services.purchases.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Purchases received by an office, newest first
#[utoipa::path(
    get,
    path = "/api/v1/purchases",
    params(PurchaseListQuery),
    responses(
        (status = 200, description = "Purchases retrieved", body = ApiResponse<PaginatedResponse<purchase::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "purchases"
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<PurchaseListQuery>,
    actor: Actor,
) -> ApiResult<PaginatedResponse<purchase::Model>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(query.limit);
    let (items, total) = state
        .services
        .purchases
        .list(&actor, query.office_id, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

/// Units a purchase brought in
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}/item-instances",
    params(("id" = i32, Path, description = "Purchase ID")),
    responses(
        (status = 200, description = "Units retrieved", body = ApiResponse<Vec<item_instance::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "purchases"
)]
pub async fn purchase_item_instances(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<Vec<item_instance::Model>> {
    let units = state.services.purchases.instances(&actor, id).await?;
    Ok(Json(ApiResponse::success(units)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn lines_are_validated_individually() {
        let req: ReceivePurchaseRequest = serde_json::from_value(serde_json::json!({
            "officeId": 1,
            "lines": [
                { "itemId": 1, "quantity": 2, "unitPrice": "12.50" },
                { "itemId": 2, "quantity": 0, "unitPrice": "1" }
            ]
        }))
        .unwrap();
        assert_eq!(req.lines[0].unit_price, dec!(12.50));
        assert!(req.validate().is_err());
    }
}
