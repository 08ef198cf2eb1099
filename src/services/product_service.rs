use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, UpdateProductRequest},
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        products::{self, ActiveModel, Column, Entity as Products},
        subcategories::{Column as SubCol, Entity as Subcategories},
    },
    error::{AppError, AppResult},
    models::{NamedRef, Product},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder, normalize_page},
    state::AppState,
};

/// Attach category and subcategory names to each product.
pub(crate) async fn hydrate_products<C: ConnectionTrait>(
    conn: &C,
    models: Vec<products::Model>,
) -> AppResult<Vec<Product>> {
    let category_ids: HashSet<Uuid> = models.iter().map(|p| p.category_id).collect();
    let subcategory_ids: HashSet<Uuid> = models.iter().map(|p| p.subcategory_id).collect();

    let categories: HashMap<Uuid, String> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        Categories::find()
            .filter(CategoryCol::Id.is_in(category_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect()
    };
    let subcategories: HashMap<Uuid, String> = if subcategory_ids.is_empty() {
        HashMap::new()
    } else {
        Subcategories::find()
            .filter(SubCol::Id.is_in(subcategory_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect()
    };

    Ok(models
        .into_iter()
        .map(|model| {
            let category = categories.get(&model.category_id).map(|name| NamedRef {
                id: model.category_id,
                name: name.clone(),
            });
            let subcategory = subcategories.get(&model.subcategory_id).map(|name| NamedRef {
                id: model.subcategory_id,
                name: name.clone(),
            });
            Product {
                category,
                subcategory,
                ..Product::from(model)
            }
        })
        .collect())
}

/// Hydrated products keyed by id; missing ids are simply absent.
pub(crate) async fn products_by_id<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, Product>> {
    let ids: HashSet<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let models = Products::find()
        .filter(Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(hydrate_products(conn, models)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect())
}

/// NotFound if the category is missing, Conflict if the subcategory lives elsewhere.
async fn ensure_placement<C: ConnectionTrait>(
    conn: &C,
    category_id: Uuid,
    subcategory_id: Uuid,
) -> AppResult<()> {
    if Categories::find_by_id(category_id).one(conn).await?.is_none() {
        return Err(AppError::not_found("Category"));
    }
    let belongs = Subcategories::find()
        .filter(SubCol::Id.eq(subcategory_id))
        .filter(SubCol::CategoryId.eq(category_id))
        .count(conn)
        .await?;
    if belongs == 0 {
        return Err(AppError::Conflict(
            "Subcategory does not belong to the specified category".into(),
        ));
    }
    Ok(())
}

/// `ILIKE` pattern matching `text` literally anywhere in the column.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<Vec<Product>>> {
    let (page, limit, offset) = normalize_page(query.page, query.limit);
    let mut condition = Condition::all();

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(subcategory_id) = query.subcategory_id {
        condition = condition.add(Column::SubcategoryId.eq(subcategory_id));
    }
    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or_default() {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Rating => Column::Rating,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };
    finder = finder.order_by_asc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = hydrate_products(&state.orm, models).await?;

    Ok(ApiResponse::paginated(items, Meta::new(page, limit, total)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let product = hydrate_products(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success(product))
}

pub async fn create_product(
    state: &AppState,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_placement(&state.orm, payload.category_id, payload.subcategory_id).await?;

    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        image: Set(payload.image),
        category_id: Set(payload.category_id),
        subcategory_id: Set(payload.subcategory_id),
        stock: Set(payload.stock),
        rating: Set(0.0),
        review_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(product_id = %model.id, "product created");
    let product = hydrate_products(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::internal("created product vanished"))?;
    Ok(ApiResponse::success(product).with_message("Product created successfully"))
}

pub async fn update_product(
    state: &AppState,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    if payload.touches_placement() {
        ensure_placement(
            &state.orm,
            payload.category_id.unwrap_or(existing.category_id),
            payload.subcategory_id.unwrap_or(existing.subcategory_id),
        )
        .await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(image) = payload.image {
        active.image = Set(image);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(subcategory_id) = payload.subcategory_id {
        active.subcategory_id = Set(subcategory_id);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    active.updated_at = Set(Utc::now().into());
    let model = active.update(&state.orm).await?;

    tracing::info!(product_id = %model.id, "product updated");
    let product = hydrate_products(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success(product).with_message("Product updated successfully"))
}

pub async fn delete_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<()>> {
    if Products::find_by_id(id).one(&state.orm).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }

    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete product. It appears in {ordered} order item(s)"
        )));
    }

    Products::delete_by_id(id).exec(&state.orm).await?;
    tracing::info!(product_id = %id, "product deleted");
    Ok(ApiResponse::message("Product deleted successfully"))
}
