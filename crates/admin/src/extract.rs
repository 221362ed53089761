//! Request body extraction with validation.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// Key `validator` uses for struct-level (schema) errors.
const SCHEMA_KEY: &str = "__all__";

/// JSON body that has passed `validator` checks.
///
/// Malformed JSON and failed checks are both rejected as 400 with the
/// messages joined as `field: message, field: message`.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::validation(rejection.body_text()))?;
        value.validate().map_err(validation_error)?;
        Ok(Self(value))
    }
}

/// Convert `validator` errors into a 400 with per-field details.
#[must_use]
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (field, field_errors) in errors.field_errors() {
        let messages = field_errors.iter().map(|e| {
            e.message
                .as_ref()
                .map_or_else(|| e.code.to_string(), ToString::to_string)
        });
        fields.entry(field.to_string()).or_default().extend(messages);
    }

    let message = fields
        .iter()
        .flat_map(|(field, messages)| {
            messages.iter().map(move |m| {
                if field == SCHEMA_KEY {
                    m.clone()
                } else {
                    format!("{field}: {m}")
                }
            })
        })
        .collect::<Vec<_>>()
        .join(", ");

    AppError::Validation {
        message,
        details: serde_json::to_value(fields).ok(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email address"))]
        email: String,
        #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
        password: String,
    }

    #[test]
    fn test_validation_message_lists_fields_in_order() {
        let body = Signup {
            email: "nope".into(),
            password: "123".into(),
        };
        let AppError::Validation { message, details } = validation_error(body.validate().unwrap_err())
        else {
            panic!("expected validation error");
        };
        assert_eq!(
            message,
            "email: Invalid email address, password: Password must be at least 6 characters"
        );
        assert_eq!(details.unwrap()["password"][0], "Password must be at least 6 characters");
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let result = ValidatedJson::<Signup>::from_request(req, &()).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}
