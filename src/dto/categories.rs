use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Body for creating or renaming a category or subcategory.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CategoryNameRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
}
