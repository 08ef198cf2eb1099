use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::{error::AppError, response::FieldError};

/// JSON body that has passed its `Validate` rules.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

/// Query string that has passed its `Validate` rules.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate().map_err(|errors| AppError::Validation(field_errors(&errors)))?;
        Ok(ValidatedJson(value))
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate().map_err(|errors| AppError::Validation(field_errors(&errors)))?;
        Ok(ValidatedQuery(value))
    }
}

/// Flatten nested validator output into `path -> message` pairs, e.g. `items[1].quantity`.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, None, &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect(errors: &ValidationErrors, prefix: Option<&str>, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let name = camel_case(field);
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name,
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code));
                    out.push(FieldError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, Some(&path), out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, Some(&format!("{path}[{index}]")), out);
                }
            }
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::orders::CreateOrderRequest;

    #[test]
    fn snake_case_fields_are_reported_in_camel_case() {
        assert_eq!(camel_case("phone_number"), "phoneNumber");
        assert_eq!(camel_case("name"), "name");
        assert_eq!(camel_case("__all__"), "all");
    }

    #[test]
    fn nested_item_errors_carry_their_index() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [
                { "productId": uuid::Uuid::new_v4(), "quantity": 1 },
                { "productId": uuid::Uuid::new_v4(), "quantity": -2 }
            ],
            "address": "742 Evergreen Terrace, Springfield",
            "phoneNumber": "5550100123"
        }))
        .unwrap();

        let errors = field_errors(&request.validate().unwrap_err());
        assert_eq!(
            errors,
            vec![FieldError {
                field: "items[1].quantity".into(),
                message: "Quantity must be between 1 and 10000".into(),
            }]
        );
    }
}
