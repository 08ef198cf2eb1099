use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::OrderStatus;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Returns `(page, limit, offset)` with defaults applied.
pub fn normalize_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;
    (page, limit, offset)
}

/// Query strings from HTML forms send `?categoryId=` for "any"; treat it as absent.
pub(crate) fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProductSortBy {
    #[default]
    CreatedAt,
    Price,
    Rating,
    Name,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OrderSortBy {
    #[default]
    CreatedAt,
    TotalAmount,
    Status,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReviewSortBy {
    #[default]
    CreatedAt,
    Rating,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UserSortBy {
    #[default]
    CreatedAt,
    Name,
    Email,
}

#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub subcategory_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
    #[validate(range(min = 1, message = "Page must be positive"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub sort_by: Option<OrderSortBy>,
    pub sort_order: Option<SortOrder>,
    #[validate(range(min = 1, message = "Page must be positive"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReviewListQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub product_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub user_id: Option<Uuid>,
    pub sort_by: Option<ReviewSortBy>,
    pub sort_order: Option<SortOrder>,
    #[validate(range(min = 1, message = "Page must be positive"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub is_admin: Option<bool>,
    pub sort_by: Option<UserSortBy>,
    pub sort_order: Option<SortOrder>,
    #[validate(range(min = 1, message = "Page must be positive"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_bounds() {
        assert_eq!(normalize_page(None, None), (1, 20, 0));
        assert_eq!(normalize_page(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(normalize_page(Some(0), Some(500)), (1, 100, 0));
    }

    #[test]
    fn empty_filters_are_ignored() {
        let query: ProductQuery =
            serde_json::from_value(serde_json::json!({ "categoryId": "", "search": "  " }))
                .unwrap();
        assert!(query.category_id.is_none());
        assert!(query.search.is_none());
    }

    #[test]
    fn sort_fields_use_camel_case_names() {
        let query: OrderListQuery = serde_json::from_value(serde_json::json!({
            "status": "SHIPPED",
            "sortBy": "totalAmount",
            "sortOrder": "asc"
        }))
        .unwrap();
        assert_eq!(query.status, Some(OrderStatus::Shipped));
        assert_eq!(query.sort_by, Some(OrderSortBy::TotalAmount));
        assert_eq!(query.sort_order, Some(SortOrder::Asc));
    }
}
