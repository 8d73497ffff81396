use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub type AuthResult<T> = Result<T, AuthError>;

/// Classified failures of the account service. Every variant maps to a
/// status code and a human-readable message; nothing is swallowed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Mobile already registered")]
    DuplicatePhone,

    /// Covers both unknown email and wrong password so callers cannot
    /// probe which emails are registered.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account locked due to multiple failed attempts")]
    AccountLocked,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail | AuthError::DuplicatePhone => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccountLocked => StatusCode::LOCKED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCode | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidOrExpiredToken | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => error!(error = %e, "database error"),
            AuthError::Internal(msg) => error!(message = %msg, "internal error"),
            AuthError::InvalidCredentials => warn!("invalid login attempt"),
            AuthError::AccountLocked => warn!("login attempt on locked account"),
            _ => tracing::debug!(error = %self, "auth error"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
