use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{dto::double_option, models::OrderStatus};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must have at least one item"), nested)]
    pub items: Vec<OrderItemRequest>,
    #[validate(length(min = 10, max = 500, message = "Address must be between 10 and 500 characters"))]
    pub address: String,
    #[validate(length(min = 8, max = 20, message = "Phone number must be between 8 and 20 characters"))]
    pub phone_number: String,
    #[validate(length(max = 1000, message = "Notes must be less than 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
}

/// `trackingNumber: null` clears the tracking number; omitting it leaves it unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: Option<OrderStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub tracking_number: Option<Option<String>>,
}

impl Validate for UpdateOrderStatusRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(Some(tracking)) = &self.tracking_number {
            let len = tracking.chars().count();
            if len > 100 {
                let mut err = ValidationError::new("length");
                err.message = Some("Tracking number is too long".into());
                errors.add("tracking_number", err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_number_distinguishes_null_from_absent() {
        let absent: UpdateOrderStatusRequest =
            serde_json::from_str(r#"{"status":"SHIPPED"}"#).unwrap();
        assert_eq!(absent.status, Some(OrderStatus::Shipped));
        assert_eq!(absent.tracking_number, None);

        let cleared: UpdateOrderStatusRequest =
            serde_json::from_str(r#"{"trackingNumber":null}"#).unwrap();
        assert_eq!(cleared.tracking_number, Some(None));

        let set: UpdateOrderStatusRequest =
            serde_json::from_str(r#"{"trackingNumber":"TRK-1"}"#).unwrap();
        assert_eq!(set.tracking_number, Some(Some("TRK-1".to_string())));
    }

    #[test]
    fn order_needs_items_and_contact_details() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [],
            "address": "short",
            "phoneNumber": "123"
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("items"));
        assert!(fields.contains_key("address"));
        assert!(fields.contains_key("phone_number"));
    }

    #[test]
    fn item_quantity_must_be_positive() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "productId": Uuid::new_v4(), "quantity": 0 }],
            "address": "221B Baker Street, London",
            "phoneNumber": "+44 20 7946 0000"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }
}
