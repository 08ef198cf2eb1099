use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    dto::categories::CategoryNameRequest,
    entity::{
        categories::{self, ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories},
        products::{Column as ProdCol, Entity as Products},
        subcategories::{self, ActiveModel as SubActive, Column as SubCol, Entity as Subcategories},
    },
    error::{AppError, AppResult},
    models::{Category, Subcategory},
    response::ApiResponse,
    state::AppState,
};

async fn find_category(state: &AppState, id: Uuid) -> AppResult<categories::Model> {
    Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}

/// A subcategory addressed through a different category is treated as missing.
async fn find_subcategory(
    state: &AppState,
    category_id: Uuid,
    id: Uuid,
) -> AppResult<subcategories::Model> {
    Subcategories::find_by_id(id)
        .filter(SubCol::CategoryId.eq(category_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Subcategory"))
}

async fn ensure_name_free(state: &AppState, name: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut finder = Categories::find().filter(CategoryCol::Name.eq(name));
    if let Some(id) = except {
        finder = finder.filter(CategoryCol::Id.ne(id));
    }
    if finder.count(&state.orm).await? > 0 {
        return Err(AppError::Conflict(name_taken(name)));
    }
    Ok(())
}

fn name_taken(name: &str) -> String {
    format!("Category with name '{name}' already exists")
}

async fn subcategories_of(state: &AppState, category_id: Uuid) -> AppResult<Vec<subcategories::Model>> {
    let subs = Subcategories::find()
        .filter(SubCol::CategoryId.eq(category_id))
        .order_by_asc(SubCol::Name)
        .all(&state.orm)
        .await?;
    Ok(subs)
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<Vec<Category>>> {
    let categories = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<subcategories::Model>> = HashMap::new();
    for sub in Subcategories::find()
        .order_by_asc(SubCol::Name)
        .all(&state.orm)
        .await?
    {
        grouped.entry(sub.category_id).or_default().push(sub);
    }

    let items = categories
        .into_iter()
        .map(|c| {
            let subs = grouped.remove(&c.id).unwrap_or_default();
            Category::with_subcategories(c, subs)
        })
        .collect();
    Ok(ApiResponse::success(items))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    let category = find_category(state, id).await?;
    let subs = subcategories_of(state, id).await?;
    Ok(ApiResponse::success(Category::with_subcategories(category, subs)))
}

pub async fn create_category(
    state: &AppState,
    payload: CategoryNameRequest,
) -> AppResult<ApiResponse<Category>> {
    let name = payload.name.trim().to_string();
    ensure_name_free(state, &name, None).await?;

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, name_taken(&name)))?;

    tracing::info!(category_id = %category.id, "category created");
    Ok(
        ApiResponse::success(Category::with_subcategories(category, Vec::new()))
            .with_message("Category created successfully"),
    )
}

pub async fn update_category(
    state: &AppState,
    id: Uuid,
    payload: CategoryNameRequest,
) -> AppResult<ApiResponse<Category>> {
    let category = find_category(state, id).await?;
    let name = payload.name.trim().to_string();
    ensure_name_free(state, &name, Some(id)).await?;

    let mut active: CategoryActive = category.into();
    active.name = Set(name.clone());
    active.updated_at = Set(Utc::now().into());
    let category = active
        .update(&state.orm)
        .await
        .map_err(|e| AppError::conflict_on_duplicate(e, name_taken(&name)))?;

    let subs = subcategories_of(state, id).await?;
    Ok(ApiResponse::success(Category::with_subcategories(category, subs))
        .with_message("Category updated successfully"))
}

pub async fn delete_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<()>> {
    find_category(state, id).await?;

    let in_use = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete category. It has {in_use} product(s)"
        )));
    }

    Categories::delete_by_id(id).exec(&state.orm).await?;
    tracing::info!(category_id = %id, "category deleted");
    Ok(ApiResponse::message("Category deleted successfully"))
}

pub async fn create_subcategory(
    state: &AppState,
    category_id: Uuid,
    payload: CategoryNameRequest,
) -> AppResult<ApiResponse<Subcategory>> {
    find_category(state, category_id).await?;

    let sub = SubActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(category_id),
        name: Set(payload.name.trim().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(subcategory_id = %sub.id, %category_id, "subcategory created");
    Ok(ApiResponse::success(Subcategory::from(sub))
        .with_message("Subcategory created successfully"))
}

pub async fn update_subcategory(
    state: &AppState,
    category_id: Uuid,
    id: Uuid,
    payload: CategoryNameRequest,
) -> AppResult<ApiResponse<Subcategory>> {
    let sub = find_subcategory(state, category_id, id).await?;

    let mut active: SubActive = sub.into();
    active.name = Set(payload.name.trim().to_string());
    active.updated_at = Set(Utc::now().into());
    let sub = active.update(&state.orm).await?;

    Ok(ApiResponse::success(Subcategory::from(sub))
        .with_message("Subcategory updated successfully"))
}

pub async fn delete_subcategory(
    state: &AppState,
    category_id: Uuid,
    id: Uuid,
) -> AppResult<ApiResponse<()>> {
    find_subcategory(state, category_id, id).await?;

    let in_use = Products::find()
        .filter(ProdCol::SubcategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete subcategory. It has {in_use} product(s)"
        )));
    }

    Subcategories::delete_by_id(id).exec(&state.orm).await?;
    tracing::info!(subcategory_id = %id, "subcategory deleted");
    Ok(ApiResponse::message("Subcategory deleted successfully"))
}
