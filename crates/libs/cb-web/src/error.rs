//! Main Crate Error

use std::time::Duration;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use cb_auth::role::Role;
use serde_json::json;
use tracing::error;

/// Every way a request can be turned down.
///
/// Each variant maps to a stable machine-readable [`code`](Error::code) and an
/// HTTP status; internal failures collapse into one generic 500 response.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Models(cb_models::error::Error),

    #[error(transparent)]
    Auth(cb_auth::error::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /* Access token errors */
    #[error("No token provided")]
    NoToken,
    #[error("Malformed token")]
    MalformedToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token type")]
    InvalidTokenType,

    /* Authorization errors */
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Insufficient permissions")]
    InsufficientPermissions {
        required_roles: Vec<Role>,
        user_role: Role,
    },

    /* Refresh token errors */
    #[error("No refresh token provided")]
    NoRefreshToken,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Refresh token expired")]
    RefreshTokenExpired,

    /* Credential errors */
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account deactivated")]
    AccountDeactivated,
    #[error("Incorrect password")]
    IncorrectPassword,

    /* Password reset errors */
    #[error("Invalid reset token")]
    InvalidResetToken,
    #[error("Reset token expired")]
    ResetTokenExpired,

    /* Account errors */
    #[error("Username already exists")]
    UsernameExists,
    #[error("Email already exists")]
    EmailExists,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("User not found")]
    UserNotFound,

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Duration },
}

impl From<cb_auth::error::Error> for Error {
    /// Token failures map onto the access-token rejections; refresh and reset
    /// paths translate their own errors before they get here.
    fn from(value: cb_auth::error::Error) -> Self {
        use cb_auth::error::Error as AuthError;
        match value {
            AuthError::TokenMalformed | AuthError::TokenRevoked => Self::MalformedToken,
            AuthError::TokenExpired => Self::TokenExpired,
            AuthError::InvalidTokenType { .. } => Self::InvalidTokenType,
            AuthError::InvalidInput(message) => Self::Validation(String::from(message)),
            other => Self::Auth(other),
        }
    }
}

impl From<cb_models::error::Error> for Error {
    fn from(value: cb_models::error::Error) -> Self {
        use cb_models::error::Error as ModelsError;
        match value {
            ModelsError::AlreadyExists("username") => Self::UsernameExists,
            ModelsError::AlreadyExists(_) => Self::EmailExists,
            ModelsError::Auth(err) => err.into(),
            other => Self::Models(other),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl Error {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoToken => "NO_TOKEN",
            Error::MalformedToken => "INVALID_TOKEN",
            Error::TokenExpired => "TOKEN_EXPIRED",
            Error::InvalidTokenType => "INVALID_TOKEN_TYPE",
            Error::NotAuthenticated => "NOT_AUTHENTICATED",
            Error::InsufficientPermissions { .. } => "INSUFFICIENT_PERMISSIONS",
            Error::NoRefreshToken => "NO_REFRESH_TOKEN",
            Error::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Error::RefreshTokenExpired => "REFRESH_TOKEN_EXPIRED",
            Error::InvalidCredentials => "INVALID_CREDENTIALS",
            Error::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            Error::IncorrectPassword => "INCORRECT_PASSWORD",
            Error::InvalidResetToken => "INVALID_RESET_TOKEN",
            Error::ResetTokenExpired => "RESET_TOKEN_EXPIRED",
            Error::UsernameExists => "USERNAME_EXISTS",
            Error::EmailExists => "EMAIL_EXISTS",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::UserNotFound => "USER_NOT_FOUND",
            Error::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Error::Models(_) | Error::Auth(_) | Error::Join(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NoToken
            | Error::MalformedToken
            | Error::TokenExpired
            | Error::InvalidTokenType
            | Error::NotAuthenticated
            | Error::InvalidRefreshToken
            | Error::RefreshTokenExpired
            | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } | Error::AccountDeactivated => {
                StatusCode::FORBIDDEN
            }
            Error::NoRefreshToken
            | Error::IncorrectPassword
            | Error::InvalidResetToken
            | Error::ResetTokenExpired
            | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::UsernameExists | Error::EmailExists => StatusCode::CONFLICT,
            Error::UserNotFound => StatusCode::NOT_FOUND,
            Error::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Models(_) | Error::Auth(_) | Error::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Human readable message sent to the client.
    pub fn message(&self) -> String {
        match self {
            Error::NoToken => String::from("Access denied. No token provided."),
            Error::MalformedToken => String::from("Invalid token."),
            Error::TokenExpired => String::from("Token expired. Please refresh your token."),
            Error::InvalidTokenType => String::from("Invalid token type."),
            Error::NotAuthenticated => String::from("Authentication required."),
            Error::InsufficientPermissions { .. } => {
                String::from("Access denied. Insufficient permissions.")
            }
            Error::NoRefreshToken => String::from("Refresh token is required."),
            Error::InvalidRefreshToken => String::from("Invalid refresh token."),
            Error::RefreshTokenExpired => {
                String::from("Refresh token expired. Please log in again.")
            }
            Error::InvalidCredentials => String::from("Invalid credentials."),
            Error::AccountDeactivated => String::from("Account is deactivated."),
            Error::IncorrectPassword => String::from("Current password is incorrect."),
            Error::InvalidResetToken => String::from("Invalid or expired reset token."),
            Error::ResetTokenExpired => {
                String::from("Reset token expired. Please request a new one.")
            }
            Error::UsernameExists => String::from("Username is already taken."),
            Error::EmailExists => String::from("Email is already registered."),
            Error::Validation(message) => message.clone(),
            Error::UserNotFound => String::from("User not found."),
            Error::RateLimitExceeded { .. } => {
                String::from("Too many requests. Please try again later.")
            }
            Error::Models(_) | Error::Auth(_) | Error::Join(_) => {
                String::from("Internal server error.")
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Creating API error response for error: {:?}", self);
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.message(),
            "status": status.as_u16(),
        });
        if let Error::InsufficientPermissions {
            required_roles,
            user_role,
        } = &self
        {
            error["required_roles"] = json!(required_roles);
            error["user_role"] = json!(user_role);
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));
        let mut response = (status, body).into_response();

        if let Error::RateLimitExceeded { retry_after } = self {
            let seconds = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
