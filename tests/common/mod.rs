#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        categories::ActiveModel as CategoryActive,
        products::{self, ActiveModel as ProductActive, Entity as Products},
        subcategories::ActiveModel as SubActive,
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    services::auth_service::hash_password,
    state::AppState,
};
use uuid::Uuid;

pub const PASSWORD: &str = "s3cret-pass";

/// Connects to the test database, or returns `None` so the caller can skip.
///
/// Every fixture uses fresh ids and unique names, so tests in one binary may run in parallel
/// against the same database without truncating it.
pub async fn setup() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let config = AppConfig::new(database_url, "integration-secret");
    Ok(Some(AppState::new(orm, config)))
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix} {}", Uuid::new_v4().simple())
}

pub fn unique_email() -> String {
    format!("{}@example.com", Uuid::new_v4().simple())
}

pub async fn create_user(state: &AppState, is_admin: bool) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set("Test User".into()),
        email: Set(unique_email()),
        password_hash: Set(hash_password(PASSWORD)?),
        is_admin: Set(is_admin),
        email_verified: Set(true),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        is_admin: user.is_admin,
    })
}

/// A fresh category with one subcategory.
pub async fn create_placement(state: &AppState) -> anyhow::Result<(Uuid, Uuid)> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(unique("Category")),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    let sub = SubActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(category.id),
        name: Set(unique("Subcategory")),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok((category.id, sub.id))
}

pub async fn create_product(
    state: &AppState,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<products::Model> {
    let (category_id, subcategory_id) = create_placement(state).await?;
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(unique("Widget")),
        description: Set("A product used by the integration tests".into()),
        price: Set(price),
        image: Set("https://example.com/widget.png".into()),
        category_id: Set(category_id),
        subcategory_id: Set(subcategory_id),
        stock: Set(stock),
        rating: Set(0.0),
        review_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn reload_product(state: &AppState, id: Uuid) -> anyhow::Result<products::Model> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {id} disappeared"))
}
