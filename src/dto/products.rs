use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 2, max = 200, message = "Name must be between 2 and 200 characters"))]
    pub name: String,
    #[validate(length(
        min = 10,
        max = 5000,
        message = "Description must be between 10 and 5000 characters"
    ))]
    pub description: String,
    #[validate(custom(function = "validate_price"))]
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    #[validate(length(min = 1, message = "Image is required"))]
    pub image: String,
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

/// Every field is optional; supplied fields follow the create rules.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "19.99")]
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub stock: Option<i32>,
}

impl UpdateProductRequest {
    pub fn touches_placement(&self) -> bool {
        self.category_id.is_some() || self.subcategory_id.is_some()
    }
}

impl Validate for UpdateProductRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_length(&mut errors, "name", name, 2, 200, "Name must be between 2 and 200 characters");
        }
        if let Some(description) = &self.description {
            check_length(
                &mut errors,
                "description",
                description,
                10,
                5000,
                "Description must be between 10 and 5000 characters",
            );
        }
        if let Some(image) = &self.image {
            check_length(&mut errors, "image", image, 1, usize::MAX, "Image is required");
        }
        if let Some(price) = &self.price {
            if let Err(err) = validate_price(price) {
                errors.add("price", err);
            }
        }
        if let Some(stock) = self.stock {
            if stock < 0 {
                errors.add("stock", message_error("range", "Stock cannot be negative"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub(crate) fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::new(1, 2) {
        return Err(message_error("price", "Price must be at least 0.01"));
    }
    if price.scale() > 2 && price.normalize().scale() > 2 {
        return Err(message_error("price", "Price can have at most two decimal places"));
    }
    Ok(())
}

fn check_length(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
    message: &'static str,
) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.add(field, message_error("length", message));
    }
}

fn message_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_must_be_at_least_one_cent() {
        assert!(validate_price(&Decimal::new(1, 2)).is_ok());
        assert!(validate_price(&Decimal::new(1999, 2)).is_ok());
        assert!(validate_price(&Decimal::ZERO).is_err());
        assert!(validate_price(&Decimal::new(-500, 2)).is_err());
    }

    #[test]
    fn price_rejects_sub_cent_precision() {
        assert!(validate_price(&Decimal::new(19999, 3)).is_err());
        assert!(validate_price(&Decimal::new(19990, 3)).is_ok());
    }

    #[test]
    fn partial_update_checks_only_supplied_fields() {
        assert!(UpdateProductRequest::default().validate().is_ok());

        let patch = UpdateProductRequest {
            name: Some("x".into()),
            stock: Some(-1),
            ..Default::default()
        };
        let errors = patch.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("stock"));
        assert!(!fields.contains_key("price"));
    }
}
