use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use greenpoints_shared::error::{SignalError, ValidationError};
use greenpoints_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Account not found".into()),
            StoreError::Conflict(_) => ServerError::Conflict(e.to_string()),
            StoreError::InvalidCredentials => ServerError::Unauthorized(e.to_string()),
            StoreError::SessionNotFound | StoreError::SessionExpired => {
                ServerError::Unauthorized(e.to_string())
            }
            StoreError::Suspended(_) => ServerError::Forbidden("Access revoked".into()),
            StoreError::AvatarCooldown { .. } => ServerError::Conflict(e.to_string()),
            StoreError::AvatarTooLarge { .. } => ServerError::TooLarge(e.to_string()),
            StoreError::InvalidUnits { .. }
            | StoreError::AvatarEncoding
            | StoreError::Validation(_) => ServerError::BadRequest(e.to_string()),
            other => ServerError::Store(other),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl From<SignalError> for ServerError {
    fn from(e: SignalError) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::TooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ServerError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
