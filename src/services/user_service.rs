use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    dto::users::{ChangePasswordRequest, UpdateProfileRequest, UpdateUserRequest},
    entity::users::{self, ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    routes::params::{SortOrder, UserListQuery, UserSortBy, normalize_page},
    services::auth_service::{hash_password, verify_password},
    state::AppState,
};

async fn find_user(state: &AppState, id: Uuid) -> AppResult<users::Model> {
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

const EMAIL_IN_USE: &str = "Email already in use";

async fn ensure_email_free(state: &AppState, email: &str, owner: Uuid) -> AppResult<()> {
    let taken = Users::find()
        .filter(UserCol::Email.eq(email))
        .filter(UserCol::Id.ne(owner))
        .count(&state.orm)
        .await?;
    if taken > 0 {
        return Err(AppError::Conflict(EMAIL_IN_USE.into()));
    }
    Ok(())
}

async fn apply_changes(
    state: &AppState,
    user: users::Model,
    name: Option<String>,
    email: Option<String>,
    is_admin: Option<bool>,
) -> AppResult<users::Model> {
    let user_id = user.id;
    let mut active: UserActive = user.into();
    if let Some(name) = name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = email {
        let email = email.trim().to_lowercase();
        ensure_email_free(state, &email, user_id).await?;
        active.email = Set(email);
    }
    if let Some(is_admin) = is_admin {
        active.is_admin = Set(is_admin);
    }
    active.updated_at = Set(Utc::now().into());
    active
        .update(&state.orm)
        .await
        .map_err(|e| AppError::conflict_on_duplicate(e, EMAIL_IN_USE))
}

pub async fn get_profile(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = find_user(state, auth.user_id).await?;
    Ok(ApiResponse::success(User::from(user)))
}

pub async fn update_profile(
    state: &AppState,
    auth: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let user = find_user(state, auth.user_id).await?;
    let user = apply_changes(state, user, payload.name, payload.email, None).await?;
    tracing::info!(user_id = %user.id, "profile updated");
    Ok(ApiResponse::success(User::from(user)).with_message("Profile updated successfully"))
}

pub async fn change_password(
    state: &AppState,
    auth: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<()>> {
    let user = find_user(state, auth.user_id).await?;
    if !verify_password(&payload.current_password, &user.password_hash) {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    let mut active: UserActive = user.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    tracing::info!(user_id = %auth.user_id, "password changed");
    Ok(ApiResponse::message("Password changed successfully"))
}

pub async fn list_users(
    state: &AppState,
    query: UserListQuery,
) -> AppResult<ApiResponse<Vec<User>>> {
    let (page, limit, offset) = normalize_page(query.page, query.limit);
    let mut condition = Condition::all();
    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(UserCol::Name).ilike(pattern.clone()))
                .add(Expr::col(UserCol::Email).ilike(pattern)),
        );
    }
    if let Some(is_admin) = query.is_admin {
        condition = condition.add(UserCol::IsAdmin.eq(is_admin));
    }

    let sort_col = match query.sort_by.unwrap_or_default() {
        UserSortBy::CreatedAt => UserCol::CreatedAt,
        UserSortBy::Name => UserCol::Name,
        UserSortBy::Email => UserCol::Email,
    };
    let mut finder = Users::find().filter(condition);
    finder = match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let users = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::paginated(users, Meta::new(page, limit, total)))
}

pub async fn get_user(state: &AppState, id: Uuid) -> AppResult<ApiResponse<User>> {
    Ok(ApiResponse::success(User::from(find_user(state, id).await?)))
}

pub async fn update_user(
    state: &AppState,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    let user = find_user(state, id).await?;
    let user = apply_changes(state, user, payload.name, payload.email, payload.is_admin).await?;
    tracing::info!(user_id = %id, is_admin = user.is_admin, "user updated");
    Ok(ApiResponse::success(User::from(user)).with_message("User updated successfully"))
}

pub async fn delete_user(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<()>> {
    if auth.user_id == id {
        return Err(AppError::Conflict("You cannot delete your own account".into()));
    }
    find_user(state, id).await?;
    Users::delete_by_id(id).exec(&state.orm).await?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(ApiResponse::message("User deleted successfully"))
}
