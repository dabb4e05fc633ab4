use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// JSON body that has passed its `validator` rules
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AppError::InvalidInput(describe(&errors)))?;

        Ok(Self(value))
    }
}

fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect();
    fields.sort();

    format!("Validation failed: {}", fields.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Named {
        #[validate(length(min = 1, max = 5, message = "must be 1-5 characters"))]
        name: String,
    }

    fn request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_valid_body() {
        let ValidatedJson(named) = ValidatedJson::<Named>::from_request(request(r#"{"name":"trip"}"#), &())
            .await
            .unwrap();
        assert_eq!(named.name, "trip");
    }

    #[tokio::test]
    async fn test_rejects_invalid_body() {
        let result = ValidatedJson::<Named>::from_request(request(r#"{"name":"roommates"}"#), &()).await;

        match result {
            Err(AppError::InvalidInput(message)) => {
                assert_eq!(message, "Validation failed: name: must be 1-5 characters")
            }
            other => panic!("unexpected result: {:?}", other.map(|v| v.0)),
        }
    }

    #[tokio::test]
    async fn test_rejects_malformed_json() {
        let result = ValidatedJson::<Named>::from_request(request("{"), &()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
