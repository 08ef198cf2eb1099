use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(
        min = 10,
        max = 2000,
        message = "Review text must be between 10 and 2000 characters"
    ))]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
    #[validate(length(
        min = 10,
        max = 2000,
        message = "Review text must be between 10 and 2000 characters"
    ))]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_is_bounded() {
        let review = CreateReviewRequest {
            product_id: Uuid::new_v4(),
            rating: 6,
            text: None,
        };
        assert!(review.validate().is_err());

        let review = CreateReviewRequest {
            rating: 5,
            ..review
        };
        assert!(review.validate().is_ok());
    }

    #[test]
    fn short_text_is_rejected() {
        let patch = UpdateReviewRequest {
            rating: None,
            text: Some("meh".into()),
        };
        assert!(patch.validate().is_err());
    }
}
