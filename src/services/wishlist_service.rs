use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    dto::wishlist::{AddToWishlistRequest, WishlistCheck},
    entity::{
        products::Entity as Products,
        wishlist_items::{ActiveModel, Column, Entity as WishlistItems},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::WishlistItem,
    response::ApiResponse,
    services::product_service::products_by_id,
    state::AppState,
};

const ALREADY_LISTED: &str = "Product already in wishlist";

pub async fn get_wishlist(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Vec<WishlistItem>>> {
    let rows = WishlistItems::find()
        .filter(Column::UserId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;
    let products = products_by_id(&state.orm, rows.iter().map(|r| r.product_id)).await?;

    let items = rows
        .into_iter()
        .map(|row| {
            let product = products.get(&row.product_id).cloned();
            WishlistItem {
                product,
                ..WishlistItem::from(row)
            }
        })
        .collect();
    Ok(ApiResponse::success(items))
}

pub async fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    payload: AddToWishlistRequest,
) -> AppResult<ApiResponse<WishlistItem>> {
    if Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Product"));
    }
    if is_listed(state, user.user_id, payload.product_id).await? {
        return Err(AppError::Conflict(ALREADY_LISTED.into()));
    }

    let row = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, ALREADY_LISTED))?;

    let mut products = products_by_id(&state.orm, [row.product_id]).await?;
    let product = products.remove(&row.product_id);
    Ok(ApiResponse::success(WishlistItem {
        product,
        ..WishlistItem::from(row)
    })
    .with_message("Product added to wishlist"))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<()>> {
    let result = WishlistItems::delete_many()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Product not in wishlist".into()));
    }
    Ok(ApiResponse::message("Product removed from wishlist"))
}

async fn is_listed(state: &AppState, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
    let count = WishlistItems::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::ProductId.eq(product_id))
        .count(&state.orm)
        .await?;
    Ok(count > 0)
}

pub async fn is_in_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<WishlistCheck>> {
    let in_wishlist = is_listed(state, user.user_id, product_id).await?;
    Ok(ApiResponse::success(WishlistCheck { in_wishlist }))
}
