use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, UpdateReviewRequest},
    entity::{
        products::{ActiveModel as ProductActive, Entity as Products},
        reviews::{self, ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::{ReviewListQuery, ReviewSortBy, SortOrder, normalize_page},
    state::AppState,
};

const DUPLICATE_REVIEW: &str = "You have already reviewed this product";

/// Mean rounded to one decimal place, and the count. No ratings gives `(0.0, 0)`.
pub fn aggregate_rating(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let count = ratings.len();
    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    let mean = sum as f64 / count as f64;
    ((mean * 10.0).round() / 10.0, count as i32)
}

/// Rewrite the product's derived rating and review count from its current reviews.
pub async fn recompute_product_rating<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<()> {
    let ratings: Vec<i32> = Reviews::find()
        .select_only()
        .column(ReviewCol::Rating)
        .filter(ReviewCol::ProductId.eq(product_id))
        .into_tuple()
        .all(conn)
        .await?;
    let (rating, review_count) = aggregate_rating(&ratings);

    // The product may have just been removed along with its reviews.
    if let Some(product) = Products::find_by_id(product_id).one(conn).await? {
        let mut active: ProductActive = product.into();
        active.rating = Set(rating);
        active.review_count = Set(review_count);
        active.updated_at = Set(Utc::now().into());
        active.update(conn).await?;
    }
    tracing::debug!(%product_id, rating, review_count, "product rating recomputed");
    Ok(())
}

async fn with_author_names<C: ConnectionTrait>(
    conn: &C,
    models: Vec<reviews::Model>,
) -> AppResult<Vec<Review>> {
    let user_ids: Vec<Uuid> = models.iter().map(|r| r.user_id).collect();
    let names: HashMap<Uuid, String> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        Users::find()
            .filter(UserCol::Id.is_in(user_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect()
    };
    Ok(models
        .into_iter()
        .map(|model| {
            let user_name = names.get(&model.user_id).cloned();
            Review {
                user_name,
                ..Review::from(model)
            }
        })
        .collect())
}

async fn with_author_name<C: ConnectionTrait>(conn: &C, model: reviews::Model) -> AppResult<Review> {
    with_author_names(conn, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Review"))
}

pub async fn list_reviews(
    state: &AppState,
    query: ReviewListQuery,
) -> AppResult<ApiResponse<Vec<Review>>> {
    let (page, limit, offset) = normalize_page(query.page, query.limit);
    let mut condition = Condition::all();
    if let Some(product_id) = query.product_id {
        condition = condition.add(ReviewCol::ProductId.eq(product_id));
    }
    if let Some(user_id) = query.user_id {
        condition = condition.add(ReviewCol::UserId.eq(user_id));
    }

    let sort_col = match query.sort_by.unwrap_or_default() {
        ReviewSortBy::CreatedAt => ReviewCol::CreatedAt,
        ReviewSortBy::Rating => ReviewCol::Rating,
    };
    let mut finder = Reviews::find().filter(condition);
    finder = match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };
    finder = finder.order_by_asc(ReviewCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_author_names(&state.orm, models).await?;

    Ok(ApiResponse::paginated(items, Meta::new(page, limit, total)))
}

pub async fn get_review(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Review>> {
    let model = Reviews::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    Ok(ApiResponse::success(with_author_name(&state.orm, model).await?))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let duplicate = Reviews::find()
        .filter(ReviewCol::UserId.eq(user.user_id))
        .filter(ReviewCol::ProductId.eq(payload.product_id))
        .count(&state.orm)
        .await?;
    if duplicate > 0 {
        return Err(AppError::Conflict(DUPLICATE_REVIEW.into()));
    }
    if Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Product"));
    }

    let txn = state.orm.begin().await?;
    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        rating: Set(payload.rating),
        text: Set(payload.text),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, DUPLICATE_REVIEW))?;
    recompute_product_rating(&txn, review.product_id).await?;
    let review = with_author_name(&txn, review).await?;
    txn.commit().await?;

    tracing::info!(review_id = %review.id, product_id = %review.product_id, "review created");
    Ok(ApiResponse::success(review).with_message("Review created successfully"))
}

/// Only the author may edit a review.
pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let txn = state.orm.begin().await?;
    let review = Reviews::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    if review.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "You can only update your own reviews".into(),
        ));
    }

    let product_id = review.product_id;
    let mut active: ReviewActive = review.into();
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    if let Some(text) = payload.text {
        active.text = Set(Some(text));
    }
    active.updated_at = Set(Utc::now().into());
    let review = active.update(&txn).await?;

    recompute_product_rating(&txn, product_id).await?;
    let review = with_author_name(&txn, review).await?;
    txn.commit().await?;

    tracing::info!(review_id = %id, "review updated");
    Ok(ApiResponse::success(review).with_message("Review updated successfully"))
}

/// Authors and admins may delete.
pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<()>> {
    let txn = state.orm.begin().await?;
    let review = Reviews::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    if review.user_id != user.user_id && !user.is_admin {
        return Err(AppError::Forbidden(
            "You can only delete your own reviews".into(),
        ));
    }

    Reviews::delete_by_id(id).exec(&txn).await?;
    recompute_product_rating(&txn, review.product_id).await?;
    txn.commit().await?;

    tracing::info!(review_id = %id, product_id = %review.product_id, "review deleted");
    Ok(ApiResponse::message("Review deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn no_reviews_reset_the_aggregate() {
        assert_eq!(aggregate_rating(&[]), (0.0, 0));
    }

    #[test]
    fn mean_is_rounded_to_one_decimal() {
        assert_eq!(aggregate_rating(&[5]), (5.0, 1));
        assert_eq!(aggregate_rating(&[4, 5]), (4.5, 2));
        assert_eq!(aggregate_rating(&[5, 4, 4]), (4.3, 3));
        assert_eq!(aggregate_rating(&[1, 2, 2]), (1.7, 3));
    }

    proptest! {
        #[test]
        fn aggregate_stays_within_rating_bounds(ratings in prop::collection::vec(1i32..=5, 1..200)) {
            let (rating, count) = aggregate_rating(&ratings);
            prop_assert_eq!(count as usize, ratings.len());
            prop_assert!((1.0..=5.0).contains(&rating));
            let scaled = rating * 10.0;
            prop_assert!((scaled - scaled.round()).abs() < 1e-9);
        }
    }
}
