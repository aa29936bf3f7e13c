//! Request-boundary error taxonomy and its JSON rendering.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::jwt::TokenError;
use crate::auth::repo::StoreError;

pub const MSG_FIELDS_REQUIRED: &str = "Email and password are required";
pub const MSG_DUPLICATE_EMAIL: &str = "User already exists";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const MSG_INTERNAL: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{}", MSG_DUPLICATE_EMAIL)]
    DuplicateEmail,

    /// Unknown email and wrong password both land here, with one message.
    #[error("{}", MSG_INVALID_CREDENTIALS)]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::DuplicateEmail => (StatusCode::BAD_REQUEST, MSG_DUPLICATE_EMAIL.into()),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, MSG_INVALID_CREDENTIALS.into())
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL.into())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AppError::Unauthorized("Token expired".into()),
            TokenError::Invalid => AppError::Unauthorized("Invalid token".into()),
            TokenError::Signing(inner) => AppError::Internal(inner.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let (status, body) = render(AppError::Internal(anyhow::anyhow!(
            "relation \"users\" does not exist"
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], MSG_INTERNAL);
    }

    #[tokio::test]
    async fn invalid_credentials_is_401_with_fixed_message() {
        let (status, body) = render(AppError::InvalidCredentials).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], MSG_INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn store_duplicate_maps_to_duplicate_email() {
        let (status, body) = render(StoreError::DuplicateEmail.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MSG_DUPLICATE_EMAIL);
    }

    #[tokio::test]
    async fn store_timeout_is_internal() {
        let (status, _) = render(StoreError::Timeout.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn token_errors_render_as_unauthorized() {
        let (status, body) = render(TokenError::Expired.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token expired");

        let (status, body) = render(TokenError::Invalid.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
    }
}
