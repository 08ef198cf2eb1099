use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, UpdateOrderStatusRequest},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, UserSummary},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, OrderSortBy, SortOrder, normalize_page},
    services::product_service::products_by_id,
    state::AppState,
};

pub(crate) fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

pub(crate) fn order_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, quantity)| line_total(price, quantity))
        .sum()
}

/// Join items (in request order), their products and optionally the buyer onto each order.
async fn hydrate_orders<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<orders::Model>,
    with_user: bool,
) -> AppResult<Vec<Order>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?;
    let products = products_by_id(conn, items.iter().map(|i| i.product_id)).await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        let product = products.get(&item.product_id).cloned();
        grouped.entry(item.order_id).or_default().push(OrderItem {
            product,
            ..OrderItem::from(item)
        });
    }

    let mut users: HashMap<Uuid, UserSummary> = HashMap::new();
    if with_user {
        let user_ids: HashSet<Uuid> = orders.iter().map(|o| o.user_id).collect();
        users = Users::find()
            .filter(UserCol::Id.is_in(user_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|u| (u.id, UserSummary::from(u)))
            .collect();
    }

    Ok(orders
        .into_iter()
        .map(|model| {
            let items = grouped.remove(&model.id).unwrap_or_default();
            let user = users.get(&model.user_id).cloned();
            Order {
                items,
                user,
                ..Order::from(model)
            }
        })
        .collect())
}

async fn hydrate_one<C: ConnectionTrait>(conn: &C, order: orders::Model) -> AppResult<Order> {
    hydrate_orders(conn, vec![order], true)
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Order"))
}

/// Give the reserved quantities of every line back to their products.
async fn restock(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(txn)
        .await?;
    for item in &items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(txn)
            .await?;
    }
    tracing::info!(%order_id, lines = items.len(), "order stock restored");
    Ok(())
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let CreateOrderRequest {
        items,
        address,
        phone_number,
        notes,
    } = payload;

    let product_ids: HashSet<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids.iter().copied()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    if products.len() != product_ids.len() {
        return Err(AppError::NotFound("One or more products not found".into()));
    }

    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        let product = products
            .get(&item.product_id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        if product.stock < item.quantity {
            return Err(AppError::Conflict(format!(
                "Insufficient stock for product {}",
                product.name
            )));
        }
        lines.push((item.product_id, item.quantity, product.price, product.name.as_str()));
    }
    let total_amount = order_total(lines.iter().map(|(_, qty, price, _)| (*price, *qty)));

    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending),
        total_amount: Set(total_amount),
        address: Set(address),
        phone_number: Set(phone_number),
        notes: Set(notes.filter(|n| !n.trim().is_empty())),
        tracking_number: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for (position, (product_id, quantity, price, name)) in lines.iter().enumerate() {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(*product_id),
            position: Set(position as i32),
            quantity: Set(*quantity),
            price: Set(*price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        // Guarded decrement: a concurrent order may have taken the stock since it was read.
        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(*quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ProdCol::Id.eq(*product_id))
            .filter(ProdCol::Stock.gte(*quantity))
            .exec(&txn)
            .await?;
        if result.rows_affected != 1 {
            return Err(AppError::Conflict(format!(
                "Insufficient stock for product {name}"
            )));
        }
    }

    let order = hydrate_one(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, user_id = %user.user_id, total = %order.total_amount, "order created");
    Ok(ApiResponse::success(order).with_message("Order created successfully"))
}

async fn list_orders(
    state: &AppState,
    scope: Option<Uuid>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let (page, limit, offset) = normalize_page(query.page, query.limit);
    let mut condition = Condition::all();
    if let Some(user_id) = scope {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_col = match query.sort_by.unwrap_or_default() {
        OrderSortBy::CreatedAt => OrderCol::CreatedAt,
        OrderSortBy::TotalAmount => OrderCol::TotalAmount,
        OrderSortBy::Status => OrderCol::Status,
    };

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };
    finder = finder.order_by_asc(OrderCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let orders = hydrate_orders(&state.orm, orders, scope.is_none()).await?;

    Ok(ApiResponse::paginated(orders, Meta::new(page, limit, total)))
}

pub async fn list_user_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<Vec<Order>>> {
    list_orders(state, Some(user.user_id), query).await
}

pub async fn list_all_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<Vec<Order>>> {
    list_orders(state, None, query).await
}

/// `owner` scopes the lookup to one user's orders.
pub async fn get_order(
    state: &AppState,
    id: Uuid,
    owner: Option<Uuid>,
) -> AppResult<ApiResponse<Order>> {
    let mut finder = Orders::find_by_id(id);
    if let Some(user_id) = owner {
        finder = finder.filter(OrderCol::UserId.eq(user_id));
    }
    let order = finder
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    Ok(ApiResponse::success(hydrate_one(&state.orm, order).await?))
}

pub async fn update_order_status(
    state: &AppState,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    let current = order.status;

    let mut active: OrderActive = order.into();
    if let Some(next) = payload.status {
        if !current.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Cannot change order status from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }
        if next == OrderStatus::Cancelled && current.holds_stock() {
            restock(&txn, id).await?;
        }
        active.status = Set(next);
    }
    if let Some(tracking_number) = payload.tracking_number {
        active.tracking_number = Set(tracking_number.filter(|t| !t.trim().is_empty()));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let order = hydrate_one(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(order_id = %id, from = current.as_str(), to = order.status.as_str(), "order status updated");
    Ok(ApiResponse::success(order).with_message("Order status updated successfully"))
}

pub async fn delete_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<()>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    if !order.status.is_deletable() {
        return Err(AppError::Conflict(
            "Only pending or cancelled orders can be deleted".into(),
        ));
    }
    if order.status == OrderStatus::Pending {
        restock(&txn, id).await?;
    }

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(id))
        .exec(&txn)
        .await?;
    Orders::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(order_id = %id, "order deleted");
    Ok(ApiResponse::message("Order deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn totals_use_exact_decimal_arithmetic() {
        assert_eq!(line_total(dec("19.99"), 3), dec("59.97"));
        assert_eq!(
            order_total([(dec("0.10"), 3), (dec("0.20"), 1)]),
            dec("0.50")
        );
        assert_eq!(order_total(Vec::new()), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn total_is_sum_of_cent_lines(lines in prop::collection::vec((1i64..1_000_000, 1i32..1000), 1..20)) {
            let priced: Vec<(Decimal, i32)> =
                lines.iter().map(|(cents, qty)| (Decimal::new(*cents, 2), *qty)).collect();
            let expected_cents: i64 = lines.iter().map(|(cents, qty)| cents * *qty as i64).sum();
            prop_assert_eq!(order_total(priced), Decimal::new(expected_cents, 2));
        }
    }
}
