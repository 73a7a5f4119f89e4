use super::common::{PageQuery, ValidatedJson};
use crate::{
    auth::Actor,
    entities::{item, office},
    errors::ServiceError,
    services::catalog::{CreateItemInput, CreateOfficeInput},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

lazy_static! {
    /// Office and item codes: letters, digits, `-` and `_`, starting with a
    /// letter or digit.
    static ref CODE_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("code pattern compiles");
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOfficeRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50), regex = "CODE_PATTERN")]
    pub code: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50), regex = "CODE_PATTERN")]
    pub item_code: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/offices",
    params(PageQuery),
    responses(
        (status = 200, description = "Offices", body = ApiResponse<PaginatedResponse<office::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn list_offices(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<PaginatedResponse<office::Model>> {
    let (page, limit) = query.resolve(&state.config);
    let (items, total) = state
        .services
        .catalog
        .list_offices(&actor, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/offices/{id}",
    params(("id" = i32, Path, description = "Office ID")),
    responses(
        (status = 200, description = "Office found", body = ApiResponse<office::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn get_office(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<office::Model> {
    let office = state.services.catalog.get_office(&actor, id).await?;
    Ok(Json(ApiResponse::success(office)))
}

#[utoipa::path(
    post,
    path = "/api/v1/offices",
    request_body = CreateOfficeRequest,
    responses(
        (status = 201, description = "Office created", body = ApiResponse<office::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn create_office(
    State(state): State<AppState>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<CreateOfficeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<office::Model>>), ServiceError> {
    let office = state
        .services
        .catalog
        .create_office(
            &actor,
            CreateOfficeInput {
                name: payload.name,
                code: payload.code,
                parent_id: payload.parent_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(office))))
}

#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(PageQuery),
    responses(
        (status = 200, description = "Items", body = ApiResponse<PaginatedResponse<item::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    actor: Actor,
) -> ApiResult<PaginatedResponse<item::Model>> {
    let (page, limit) = query.resolve(&state.config);
    let (items, total) = state
        .services
        .catalog
        .list_items(&actor, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = i32, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item found", body = ApiResponse<item::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    actor: Actor,
) -> ApiResult<item::Model> {
    let item = state.services.catalog.get_item(&actor, id).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ApiResponse<item::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn create_item(
    State(state): State<AppState>,
    actor: Actor,
    ValidatedJson(payload): ValidatedJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<item::Model>>), ServiceError> {
    let item = state
        .services
        .catalog
        .create_item(
            &actor,
            CreateItemInput {
                name: payload.name,
                item_code: payload.item_code,
                description: payload.description,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("CHR-01", true ; "dash")]
    #[test_case("store_2", true ; "underscore")]
    #[test_case("-LEAD", false ; "leading dash")]
    #[test_case("A B", false ; "space")]
    fn item_codes(code: &str, ok: bool) {
        let req = CreateItemRequest {
            name: "Chair".into(),
            item_code: code.into(),
            description: None,
        };
        assert_eq!(req.validate().is_ok(), ok);
    }
}
