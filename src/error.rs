use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    password::PasswordError,
    policy::Denial,
    repository::{DuplicateKey, RepoError},
    storage::StorageError,
    token::TokenError,
};

/// AppError
///
/// The single error type returned by handlers and the `AuthUser` extractor.
/// Every variant maps to one HTTP status and a stable snake_case `code`;
/// infrastructure failures are logged here and rendered as an opaque 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    Token(#[from] TokenError),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("This user account is deactivated")]
    AccountDeactivated,

    #[error("Invalid or expired token")]
    InvalidVerificationToken,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Student already enrolled in this course")]
    AlreadyEnrolled,

    #[error("Not enrolled in this course")]
    NotEnrolled,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("password hashing error: {0}")]
    Password(#[from] PasswordError),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Token(TokenError::Signing) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingToken
            | AppError::Token(_)
            | AppError::InvalidCredentials
            | AppError::EmailNotVerified => StatusCode::UNAUTHORIZED,
            AppError::AccountDeactivated | AppError::Forbidden(_) | AppError::NotEnrolled => {
                StatusCode::FORBIDDEN
            }
            AppError::InvalidVerificationToken => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEmail | AppError::Conflict(_) | AppError::AlreadyEnrolled => {
                StatusCode::CONFLICT
            }
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Password(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::Token(TokenError::Signing) => "internal_error",
            AppError::MissingToken | AppError::Token(_) => "invalid_token",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::EmailNotVerified => "email_not_verified",
            AppError::AccountDeactivated => "account_deactivated",
            AppError::InvalidVerificationToken => "invalid_verification_token",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::DuplicateEmail => "duplicate_email",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyEnrolled => "already_enrolled",
            AppError::NotEnrolled => "not_enrolled",
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Password(_) => "internal_error",
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate(DuplicateKey::Email) => AppError::DuplicateEmail,
            RepoError::Duplicate(DuplicateKey::Username) => {
                AppError::Conflict("Username already taken")
            }
            RepoError::Duplicate(DuplicateKey::Enrollment) => AppError::AlreadyEnrolled,
            RepoError::Duplicate(DuplicateKey::Other) => AppError::Conflict("Record already exists"),
            RepoError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Forbidden(reason) => AppError::Forbidden(reason),
            Denial::NotFound(reason) => AppError::NotFound(reason),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Validation { field, message } => json!({
                "code": self.code(),
                "detail": message,
                "field": field,
            }),
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "request failed");
                json!({ "code": self.code(), "detail": "Internal server error" })
            }
            _ => json!({ "code": self.code(), "detail": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
