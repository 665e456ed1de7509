//! Verification of refresh and reset tokens.
//!
//! These paths never look at the `Authorization` header. Each one maps codec
//! failures onto its own error codes so a client can tell "refresh your
//! token" apart from "log in again".

use cb_auth::{
    error::Error as AuthError,
    jwt::{Claims, TokenCodec, TokenType},
};
use tracing::debug;

use crate::prelude::*;

/// Verifies the refresh token presented to the refresh endpoint.
///
/// `None` or an empty token means the client sent nothing.
pub fn verify_refresh_token(codec: &TokenCodec, token: Option<&str>) -> Result<Claims> {
    let token = token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Error::NoRefreshToken)?;

    codec
        .verify(token, TokenType::Refresh)
        .map_err(|err| match err {
            AuthError::TokenExpired => Error::RefreshTokenExpired,
            err => {
                debug!("Refresh token rejected: {err}");
                Error::InvalidRefreshToken
            }
        })
}

/// Verifies a password-reset token.
pub fn verify_reset_token(codec: &TokenCodec, token: &str) -> Result<Claims> {
    codec
        .verify(token.trim(), TokenType::Reset)
        .map_err(|err| match err {
            AuthError::TokenExpired => Error::ResetTokenExpired,
            err => {
                debug!("Reset token rejected: {err}");
                Error::InvalidResetToken
            }
        })
}

#[cfg(test)]
mod tests {
    use cb_auth::{
        config::TokenConfig,
        jwt::Subject,
        role::{Identity, Role},
    };
    use chrono::{TimeDelta, Utc};
    use uuid::Uuid;

    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig::with_secret("refresh-test-secret")).unwrap()
    }

    fn subject() -> Subject {
        Subject::from(&Identity::new(Uuid::new_v4(), "r@example.com", Role::User))
    }

    #[test]
    fn absent_refresh_token() {
        let codec = codec();
        assert!(matches!(
            verify_refresh_token(&codec, None),
            Err(Error::NoRefreshToken)
        ));
        assert!(matches!(
            verify_refresh_token(&codec, Some("  ")),
            Err(Error::NoRefreshToken)
        ));
    }

    #[test]
    fn refresh_failures_use_refresh_codes() {
        let codec = codec();
        let access = codec.sign(&subject(), TokenType::Access).unwrap();
        let expired = codec
            .sign_at(&subject(), TokenType::Refresh, Utc::now() - TimeDelta::days(8))
            .unwrap();

        assert!(matches!(
            verify_refresh_token(&codec, Some(&access)),
            Err(Error::InvalidRefreshToken)
        ));
        assert!(matches!(
            verify_refresh_token(&codec, Some("garbage")),
            Err(Error::InvalidRefreshToken)
        ));
        let err = verify_refresh_token(&codec, Some(&expired)).unwrap_err();
        assert_eq!(err.code(), "REFRESH_TOKEN_EXPIRED");
        assert!(err.message().contains("log in again"));
    }

    #[test]
    fn valid_refresh_token_returns_claims() {
        let codec = codec();
        let subject = subject();
        let token = codec.sign(&subject, TokenType::Refresh).unwrap();

        let claims = verify_refresh_token(&codec, Some(&token)).unwrap();
        assert_eq!(claims.sub, subject.user_id);
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn reset_failures_use_reset_codes() {
        let codec = codec();
        let expired = codec
            .sign_at(
                &Subject::email_only("r@example.com"),
                TokenType::Reset,
                Utc::now() - TimeDelta::hours(2),
            )
            .unwrap();
        let refresh = codec.sign(&subject(), TokenType::Refresh).unwrap();

        assert!(matches!(
            verify_reset_token(&codec, &expired),
            Err(Error::ResetTokenExpired)
        ));
        assert!(matches!(
            verify_reset_token(&codec, &refresh),
            Err(Error::InvalidResetToken)
        ));
    }
}
