use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::ApiResponse,
    state::AppState,
};

const CART_SELECT: &str = r#"
    SELECT ci.id, ci.user_id, ci.product_id, ci.quantity, ci.created_at, ci.updated_at,
           p.name, p.description, p.price, p.image, p.category_id, p.subcategory_id,
           p.stock, p.rating, p.review_count,
           p.created_at AS product_created_at, p.updated_at AS product_updated_at
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
"#;

#[derive(FromRow)]
struct CartWithProductRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    name: String,
    description: String,
    price: Decimal,
    image: String,
    category_id: Uuid,
    subcategory_id: Uuid,
    stock: i32,
    rating: f64,
    review_count: i32,
    product_created_at: DateTime<Utc>,
    product_updated_at: DateTime<Utc>,
}

impl From<CartWithProductRow> for CartItem {
    fn from(row: CartWithProductRow) -> Self {
        CartItem {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
            product: Some(Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                price: row.price,
                image: row.image,
                category_id: row.category_id,
                subcategory_id: row.subcategory_id,
                stock: row.stock,
                rating: row.rating,
                review_count: row.review_count,
                created_at: row.product_created_at,
                updated_at: row.product_updated_at,
                category: None,
                subcategory: None,
            }),
        }
    }
}

async fn product_stock(pool: &PgPool, product_id: Uuid) -> AppResult<i32> {
    let stock: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    stock
        .map(|(s,)| s)
        .ok_or_else(|| AppError::not_found("Product"))
}

async fn current_quantity(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<Option<i32>> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(q,)| q))
}

async fn fetch_item(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<CartItem> {
    let row = sqlx::query_as::<_, CartWithProductRow>(&format!(
        "{CART_SELECT} WHERE ci.user_id = $1 AND ci.product_id = $2"
    ))
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Cart item"))?;
    Ok(row.into())
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Vec<CartItem>>> {
    let rows = sqlx::query_as::<_, CartWithProductRow>(&format!(
        "{CART_SELECT} WHERE ci.user_id = $1 ORDER BY ci.created_at DESC"
    ))
    .bind(user.user_id)
    .fetch_all(state.orm.get_postgres_connection_pool())
    .await?;

    Ok(ApiResponse::success(rows.into_iter().map(CartItem::from).collect()))
}

/// Adds to an existing line when the product is already in the cart.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let pool = state.orm.get_postgres_connection_pool();
    let quantity = payload.quantity.unwrap_or(1);
    let stock = product_stock(pool, payload.product_id).await?;
    let existing = current_quantity(pool, user.user_id, payload.product_id)
        .await?
        .unwrap_or(0);

    match existing.checked_add(quantity) {
        Some(wanted) if wanted <= stock => {}
        _ => return Err(AppError::Conflict("Insufficient stock".into())),
    }

    sqlx::query(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(quantity)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %user.user_id, product_id = %payload.product_id, quantity, "cart item added");
    let item = fetch_item(pool, user.user_id, payload.product_id).await?;
    Ok(ApiResponse::success(item).with_message("Item added to cart"))
}

/// A quantity of zero or less removes the line and yields no item.
pub async fn update_cart_item_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Option<CartItem>>> {
    let pool = state.orm.get_postgres_connection_pool();

    if payload.quantity <= 0 {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(product_id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Cart item"));
        }
        return Ok(ApiResponse::success(None).with_message("Item removed from cart"));
    }

    if current_quantity(pool, user.user_id, product_id).await?.is_none() {
        return Err(AppError::not_found("Cart item"));
    }
    let stock = product_stock(pool, product_id).await?;
    if stock < payload.quantity {
        return Err(AppError::Conflict("Insufficient stock".into()));
    }

    sqlx::query(
        "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE user_id = $1 AND product_id = $2",
    )
    .bind(user.user_id)
    .bind(product_id)
    .bind(payload.quantity)
    .execute(pool)
    .await?;

    let item = fetch_item(pool, user.user_id, product_id).await?;
    Ok(ApiResponse::success(Some(item)).with_message("Cart updated"))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<()>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(state.orm.get_postgres_connection_pool())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Cart item"));
    }
    Ok(ApiResponse::message("Item removed from cart"))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<()>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(state.orm.get_postgres_connection_pool())
        .await?;
    tracing::info!(user_id = %user.user_id, removed = result.rows_affected(), "cart cleared");
    Ok(ApiResponse::message("Cart cleared"))
}
