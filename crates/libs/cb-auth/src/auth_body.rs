//! Authentication response structures.
//!
//! Standard response format for issued tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CONNECTION_TOKEN_TYPE;

/// Access and refresh token issued together at login, registration or reset.
///
/// # JSON Format
///
/// ```json
/// {
///   "access_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
///   "refresh_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
///   "token_type": "Bearer",
///   "access_expires_at": "2025-01-01T00:15:00Z",
///   "refresh_expires_at": "2025-01-08T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthBody {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "Bearer".
    pub token_type: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl AuthBody {
    pub fn new(
        access_token: String,
        access_expires_at: DateTime<Utc>,
        refresh_token: String,
        refresh_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: String::from(CONNECTION_TOKEN_TYPE),
            access_expires_at,
            refresh_expires_at,
        }
    }
}

/// A freshly minted access token, as returned by the refresh endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessBody {
    pub access_token: String,
    pub token_type: String,
    pub access_expires_at: DateTime<Utc>,
}

impl AccessBody {
    /// ```rust
    /// use cb_auth::auth_body::AccessBody;
    ///
    /// let response = AccessBody::new("some_token".to_string(), chrono::Utc::now());
    /// assert_eq!(response.token_type, "Bearer");
    /// ```
    pub fn new(access_token: String, access_expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type: String::from(CONNECTION_TOKEN_TYPE),
            access_expires_at,
        }
    }
}
