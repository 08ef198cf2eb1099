mod common;

use std::str::FromStr;

use rust_decimal::Decimal;
use storefront_api::{
    dto::{
        orders::{CreateOrderRequest, OrderItemRequest, UpdateOrderStatusRequest},
        products::UpdateProductRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{Order, OrderStatus},
    routes::params::OrderListQuery,
    services::{order_service, product_service},
    state::AppState,
};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn order_request(items: &[(Uuid, i32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        items: items
            .iter()
            .map(|(product_id, quantity)| OrderItemRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        address: "221B Baker Street, London".into(),
        phone_number: "+44 20 7946 0000".into(),
        notes: None,
    }
}

async fn place(state: &AppState, user: &AuthUser, items: &[(Uuid, i32)]) -> anyhow::Result<Order> {
    let resp = order_service::create_order(state, user, order_request(items)).await?;
    Ok(resp.data.expect("order"))
}

async fn set_status(
    state: &AppState,
    id: Uuid,
    status: OrderStatus,
) -> Result<Order, AppError> {
    let resp = order_service::update_order_status(
        state,
        id,
        UpdateOrderStatusRequest {
            status: Some(status),
            tracking_number: None,
        },
    )
    .await?;
    Ok(resp.data.expect("order"))
}

#[tokio::test]
async fn order_decrements_stock_and_snapshots_price() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("19.99"), 5).await?;

    let order = place(&state, &user, &[(product.id, 2)]).await?;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, dec("39.98"));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].price, dec("19.99"));
    assert_eq!(order.user.as_ref().map(|u| u.id), Some(user.user_id));
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 3);

    product_service::update_product(
        &state,
        product.id,
        UpdateProductRequest {
            price: Some(dec("50.00")),
            ..Default::default()
        },
    )
    .await?;

    let fetched = order_service::get_order(&state, order.id, Some(user.user_id))
        .await?
        .data
        .expect("order");
    assert_eq!(fetched.total_amount, dec("39.98"));
    assert_eq!(fetched.items[0].price, dec("19.99"));
    Ok(())
}

#[tokio::test]
async fn failing_line_rolls_back_the_whole_order() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let plenty = common::create_product(&state, dec("5.00"), 5).await?;
    let scarce = common::create_product(&state, dec("7.50"), 1).await?;

    let err = order_service::create_order(
        &state,
        &user,
        order_request(&[(plenty.id, 2), (scarce.id, 2)]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(common::reload_product(&state, plenty.id).await?.stock, 5);
    assert_eq!(common::reload_product(&state, scarce.id).await?.stock, 1);
    let mine = order_service::list_user_orders(&state, &user, OrderListQuery::default()).await?;
    assert_eq!(mine.pagination.expect("meta").total, 0);
    Ok(())
}

#[tokio::test]
async fn repeated_product_lines_cannot_oversell() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("3.00"), 3).await?;

    let err = order_service::create_order(
        &state,
        &user,
        order_request(&[(product.id, 2), (product.id, 2)]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 3);
    Ok(())
}

#[tokio::test]
async fn unknown_product_is_not_found() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("3.00"), 3).await?;

    let err = order_service::create_order(
        &state,
        &user,
        order_request(&[(product.id, 1), (Uuid::new_v4(), 1)]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 3);
    Ok(())
}

#[tokio::test]
async fn cancelling_restores_stock_once_and_is_terminal() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("10.00"), 5).await?;

    let order = place(&state, &user, &[(product.id, 3)]).await?;
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 2);

    set_status(&state, order.id, OrderStatus::Processing).await?;
    let cancelled = set_status(&state, order.id, OrderStatus::Cancelled).await?;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 5);

    for next in [OrderStatus::Pending, OrderStatus::Cancelled] {
        let err = set_status(&state, order.id, next).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 5);

    order_service::delete_order(&state, order.id).await?;
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 5);
    let err = order_service::get_order(&state, order.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn delivered_orders_only_accept_delivered() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("10.00"), 5).await?;
    let order = place(&state, &user, &[(product.id, 1)]).await?;

    set_status(&state, order.id, OrderStatus::Shipped).await?;
    set_status(&state, order.id, OrderStatus::Delivered).await?;
    assert!(matches!(
        set_status(&state, order.id, OrderStatus::Shipped).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        set_status(&state, order.id, OrderStatus::Cancelled).await,
        Err(AppError::BadRequest(_))
    ));
    set_status(&state, order.id, OrderStatus::Delivered).await?;

    let err = order_service::delete_order(&state, order.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn deleting_pending_order_restores_stock() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("2.50"), 4).await?;
    let order = place(&state, &user, &[(product.id, 4)]).await?;
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 0);

    order_service::delete_order(&state, order.id).await?;
    assert_eq!(common::reload_product(&state, product.id).await?.stock, 4);
    Ok(())
}

#[tokio::test]
async fn tracking_number_is_set_and_cleared_independently() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("2.50"), 4).await?;
    let order = place(&state, &user, &[(product.id, 1)]).await?;

    let updated = order_service::update_order_status(
        &state,
        order.id,
        UpdateOrderStatusRequest {
            status: None,
            tracking_number: Some(Some("TRK-123".into())),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(updated.status, OrderStatus::Pending);
    assert_eq!(updated.tracking_number.as_deref(), Some("TRK-123"));

    let cleared = order_service::update_order_status(
        &state,
        order.id,
        UpdateOrderStatusRequest {
            status: None,
            tracking_number: Some(None),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(cleared.tracking_number, None);
    Ok(())
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let buyer = common::create_user(&state, false).await?;
    let stranger = common::create_user(&state, false).await?;
    let product = common::create_product(&state, dec("1.00"), 10).await?;
    let order = place(&state, &buyer, &[(product.id, 1)]).await?;

    let err = order_service::get_order(&state, order.id, Some(stranger.user_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mine = order_service::list_user_orders(&state, &buyer, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].items[0].product.as_ref().map(|p| p.id), Some(product.id));
    Ok(())
}
