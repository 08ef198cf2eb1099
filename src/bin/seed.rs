use rust_decimal::Decimal;
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool();

    let admin_id = ensure_user(pool, "Store Admin", "admin@example.com", "admin12345", true).await?;
    let user_id = ensure_user(pool, "Demo Shopper", "user@example.com", "user12345", false).await?;
    seed_catalog(pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    is_admin: bool,
) -> anyhow::Result<Uuid> {
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, is_admin, email_verified)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        ON CONFLICT (email) DO UPDATE SET is_admin = EXCLUDED.is_admin
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(is_admin)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (admin={is_admin})");
    Ok(user_id)
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name) VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_subcategory(
    pool: &sqlx::PgPool,
    category_id: Uuid,
    name: &str,
) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM subcategories WHERE category_id = $1 AND name = $2")
            .bind(category_id)
            .bind(name)
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO subcategories (id, category_id, name) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(category_id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let catalog = [
        (
            "Apparel",
            "Hoodies",
            "Axum Hoodie",
            "Warm hoodie for Rustaceans, heavyweight cotton",
            Decimal::new(5500, 2),
            50,
        ),
        (
            "Apparel",
            "T-Shirts",
            "Ferris Tee",
            "Soft tee with a friendly crab on the front",
            Decimal::new(2400, 2),
            120,
        ),
        (
            "Home",
            "Kitchen",
            "Ferris Mug",
            "Coffee tastes better with Ferris on the side",
            Decimal::new(1200, 2),
            100,
        ),
        (
            "Books",
            "Programming",
            "E-book: Async Rust",
            "Learn async Rust patterns from futures to executors",
            Decimal::new(2500, 2),
            75,
        ),
    ];

    for (category, subcategory, name, description, price, stock) in catalog {
        let category_id = ensure_category(pool, category).await?;
        let subcategory_id = ensure_subcategory(pool, category_id, subcategory).await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, image, category_id, subcategory_id, stock)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(price)
        .bind("https://placehold.co/600x600?text=Storefront")
        .bind(category_id)
        .bind(subcategory_id)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
