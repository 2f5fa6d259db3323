use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{error_response, ApiError};

/// `Json` whose rejections use the `{ "error", "timestamp" }` body.
/// Unreadable or mistyped bodies are 400, a missing JSON content type is 415.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| ApiJson(value))
            .map_err(|rejection| {
                let message = rejection.body_text();
                json_rejection_response(rejection, message)
            })
    }
}

/// Maps a body rejection to an error response carrying `message`
pub fn json_rejection_response(rejection: JsonRejection, message: impl Into<String>) -> ApiError {
    let status = match rejection {
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::BAD_REQUEST,
    };
    warn!(rejection = %rejection.body_text(), status = %status, "Rejected request body");
    error_response(status, message)
}
