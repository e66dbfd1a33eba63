use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use shared_types::AppError;
use uuid::Uuid;

/// JSON body extractor whose rejections use the error envelope.
///
/// Missing or mistyped fields become a 400 `ValidationError`; malformed JSON
/// and a missing content type become a 400 `BadRequest`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection_to_app_error(rejection)),
        }
    }
}

fn json_rejection_to_app_error(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(e) => {
            AppError::validation(e.body_text(), Default::default())
        }
        JsonRejection::JsonSyntaxError(_) => AppError::bad_request("Malformed JSON body"),
        JsonRejection::MissingJsonContentType(_) => {
            AppError::bad_request("Expected Content-Type: application/json")
        }
        other => AppError::bad_request(other.body_text()),
    }
}

/// Query-string extractor whose rejections use the error envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        axum::extract::Query::<T>::from_request_parts(parts, state)
            .await
            .map(|q| ApiQuery(q.0))
            .map_err(|e: QueryRejection| AppError::validation(e.body_text(), Default::default()))
    }
}

/// Parse a path segment as a UUID. `what` names the resource in the error.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request(format!("Invalid {what} id")))
}
