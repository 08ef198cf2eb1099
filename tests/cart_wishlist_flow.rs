mod common;

use rust_decimal::Decimal;
use storefront_api::{
    dto::{
        cart::{AddToCartRequest, UpdateCartItemRequest},
        wishlist::{AddToWishlistRequest, WishlistCheck},
    },
    error::AppError,
    response::ApiResponse,
    services::{cart_service, wishlist_service},
};

#[tokio::test]
async fn cart_merge_respects_stock() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, Decimal::new(1500, 2), 5).await?;
    let add = |quantity| AddToCartRequest {
        product_id: product.id,
        quantity: Some(quantity),
    };

    let item = cart_service::add_to_cart(&state, &user, add(3))
        .await?
        .data
        .expect("item");
    assert_eq!(item.quantity, 3);

    let err = cart_service::add_to_cart(&state, &user, add(3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let item = cart_service::add_to_cart(&state, &user, add(2))
        .await?
        .data
        .expect("item");
    assert_eq!(item.quantity, 5);

    let cart = cart_service::get_cart(&state, &user).await?.data.expect("cart");
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].product.as_ref().map(|p| p.stock), Some(5));
    Ok(())
}

#[tokio::test]
async fn cart_quantity_updates_and_removal() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, Decimal::new(1500, 2), 4).await?;

    let err = cart_service::update_cart_item_quantity(
        &state,
        &user,
        product.id,
        UpdateCartItemRequest { quantity: 0 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: None,
        },
    )
    .await?;

    let err = cart_service::update_cart_item_quantity(
        &state,
        &user,
        product.id,
        UpdateCartItemRequest { quantity: 9 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let updated = cart_service::update_cart_item_quantity(
        &state,
        &user,
        product.id,
        UpdateCartItemRequest { quantity: 4 },
    )
    .await?;
    assert_eq!(updated.data.flatten().map(|i| i.quantity), Some(4));

    let removed = cart_service::update_cart_item_quantity(
        &state,
        &user,
        product.id,
        UpdateCartItemRequest { quantity: 0 },
    )
    .await?;
    assert!(removed.data.flatten().is_none());

    let err = cart_service::remove_from_cart(&state, &user, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn clearing_cart_is_idempotent() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, Decimal::new(100, 2), 10).await?;
    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: Some(2),
        },
    )
    .await?;

    cart_service::clear_cart(&state, &user).await?;
    cart_service::clear_cart(&state, &user).await?;
    let cart = cart_service::get_cart(&state, &user).await?.data.expect("cart");
    assert!(cart.is_empty());
    Ok(())
}

#[tokio::test]
async fn wishlist_membership() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, Decimal::new(100, 2), 10).await?;
    let in_wishlist = |resp: ApiResponse<WishlistCheck>| resp.data.map(|c| c.in_wishlist);

    assert_eq!(
        in_wishlist(wishlist_service::is_in_wishlist(&state, &user, product.id).await?),
        Some(false)
    );

    let added = wishlist_service::add_to_wishlist(
        &state,
        &user,
        AddToWishlistRequest {
            product_id: product.id,
        },
    )
    .await?
    .data
    .expect("item");
    assert_eq!(added.product.as_ref().map(|p| p.id), Some(product.id));

    let err = wishlist_service::add_to_wishlist(
        &state,
        &user,
        AddToWishlistRequest {
            product_id: product.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    for _ in 0..2 {
        assert_eq!(
            in_wishlist(wishlist_service::is_in_wishlist(&state, &user, product.id).await?),
            Some(true)
        );
    }

    let listed = wishlist_service::get_wishlist(&state, &user).await?.data.expect("wishlist");
    assert_eq!(listed.len(), 1);

    wishlist_service::remove_from_wishlist(&state, &user, product.id).await?;
    let err = wishlist_service::remove_from_wishlist(&state, &user, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(
        in_wishlist(wishlist_service::is_in_wishlist(&state, &user, product.id).await?),
        Some(false)
    );
    Ok(())
}

#[tokio::test]
async fn huge_cart_quantity_is_insufficient_stock() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    let product = common::create_product(&state, Decimal::new(1500, 2), 5).await?;
    let add = |quantity| AddToCartRequest {
        product_id: product.id,
        quantity: Some(quantity),
    };

    cart_service::add_to_cart(&state, &user, add(1)).await?;
    let err = cart_service::add_to_cart(&state, &user, add(i32::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let cart = cart_service::get_cart(&state, &user).await?.data.expect("cart");
    assert_eq!(cart[0].quantity, 1);
    Ok(())
}

#[tokio::test]
async fn racing_wishlist_adds_yield_one_conflict() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&state, false).await?;
    for _ in 0..5 {
        let product = common::create_product(&state, Decimal::new(100, 2), 10).await?;
        let add = || {
            wishlist_service::add_to_wishlist(
                &state,
                &user,
                AddToWishlistRequest {
                    product_id: product.id,
                },
            )
        };

        let (a, b) = tokio::join!(add(), add());
        let mut results = [a, b];
        results.sort_by_key(|r| r.is_err());
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AppError::Conflict(_))));
    }
    Ok(())
}
