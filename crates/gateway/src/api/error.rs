//! Domain-error → HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use wr_domain::Error;

pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::NotYourTurn(_) => StatusCode::CONFLICT,
            Error::InvalidAction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Operators get the cause; clients get an opaque message.
        let message = if let Error::Internal(cause) = &self.0 {
            tracing::error!(%cause, "internal error");
            "internal error".to_owned()
        } else {
            self.0.to_string()
        };

        (
            status,
            Json(serde_json::json!({
                "error": self.0.kind(),
                "message": message,
            })),
        )
            .into_response()
    }
}
