use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::categories::CategoryNameRequest,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Subcategory},
    response::{ApiResponse, ErrorResponse, MessageResponse},
    services::category_service,
    state::AppState,
    validation::ValidatedJson,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/{id}/subcategories", post(create_subcategory))
        .route(
            "/{id}/subcategories/{sub_id}",
            put(update_subcategory).delete(delete_subcategory),
        )
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories with their subcategories", body = ApiResponse<Vec<Category>>)
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    Ok(Json(category_service::list_categories(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category detail", body = ApiResponse<Category>),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Category>>> {
    Ok(Json(category_service::get_category(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CategoryNameRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Name already taken", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<CategoryNameRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    ensure_admin(&user)?;
    let resp = category_service::create_category(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryNameRequest,
    responses(
        (status = 200, description = "Category renamed", body = ApiResponse<Category>),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CategoryNameRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    ensure_admin(&user)?;
    Ok(Json(category_service::update_category(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 400, description = "Category still has products", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    ensure_admin(&user)?;
    Ok(Json(category_service::delete_category(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/categories/{id}/subcategories",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryNameRequest,
    responses(
        (status = 201, description = "Subcategory created", body = ApiResponse<Subcategory>),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn create_subcategory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CategoryNameRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Subcategory>>)> {
    ensure_admin(&user)?;
    let resp = category_service::create_subcategory(&state, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}/subcategories/{sub_id}",
    params(
        ("id" = Uuid, Path, description = "Category id"),
        ("sub_id" = Uuid, Path, description = "Subcategory id")
    ),
    request_body = CategoryNameRequest,
    responses(
        (status = 200, description = "Subcategory renamed", body = ApiResponse<Subcategory>),
        (status = 404, description = "Subcategory not found in this category", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn update_subcategory(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, sub_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(payload): ValidatedJson<CategoryNameRequest>,
) -> AppResult<Json<ApiResponse<Subcategory>>> {
    ensure_admin(&user)?;
    Ok(Json(
        category_service::update_subcategory(&state, id, sub_id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}/subcategories/{sub_id}",
    params(
        ("id" = Uuid, Path, description = "Category id"),
        ("sub_id" = Uuid, Path, description = "Subcategory id")
    ),
    responses(
        (status = 200, description = "Subcategory deleted", body = MessageResponse),
        (status = 400, description = "Subcategory still has products", body = ErrorResponse),
        (status = 404, description = "Subcategory not found in this category", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn delete_subcategory(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, sub_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<()>>> {
    ensure_admin(&user)?;
    Ok(Json(category_service::delete_subcategory(&state, id, sub_id).await?))
}
