//! Request body extraction with validation

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;
use validator::Validate;

use crate::error::{normalize_request_failure, ApiError};

/// JSON body that must both deserialize and pass its `validator` rules.
///
/// Either failure is re-tagged as `VALIDATION_ERROR` and mapped like any
/// downstream error, so callers always get `400 "Validation Error"`. The
/// parser's own message is kept as detail for the logs only.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                let details = json!({ "error": rejection.body_text() });
                ApiError::from(normalize_request_failure(rejection.status(), details))
            })?;

        value.validate().map_err(|errors| {
            let details = json!({ "error": errors.to_string() });
            ApiError::from(normalize_request_failure(StatusCode::BAD_REQUEST, details))
        })?;

        Ok(ValidatedJson(value))
    }
}
