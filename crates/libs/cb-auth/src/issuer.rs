//! Token issuance on top of the [`TokenCodec`].

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    auth_body::{AccessBody, AuthBody},
    jwt::{Subject, TokenCodec, TokenType},
    prelude::*,
    role::Identity,
};

/// Mints the access/refresh pair handed out at login and registration.
///
/// Both tokens are built from one [`Subject`] and one clock reading, so their
/// subject claims can never drift apart.
pub fn issue_auth_tokens(codec: &TokenCodec, identity: &Identity) -> Result<AuthBody> {
    issue_auth_tokens_at(codec, identity, Utc::now())
}

pub fn issue_auth_tokens_at(
    codec: &TokenCodec,
    identity: &Identity,
    now: DateTime<Utc>,
) -> Result<AuthBody> {
    let subject = Subject::from(identity);
    let config = codec.config();

    let access_token = codec.sign_at(&subject, TokenType::Access, now)?;
    let refresh_token = codec.sign_at(&subject, TokenType::Refresh, now)?;
    debug!("Issued token pair for user {}", identity.user_id);

    Ok(AuthBody::new(
        access_token,
        now + config.access_ttl,
        refresh_token,
        now + config.refresh_ttl,
    ))
}

/// Mints a lone access token, used when a refresh token is exchanged.
pub fn issue_access_token(codec: &TokenCodec, identity: &Identity) -> Result<AccessBody> {
    let now = Utc::now();
    let access_token = codec.sign_at(&Subject::from(identity), TokenType::Access, now)?;
    Ok(AccessBody::new(access_token, now + codec.config().access_ttl))
}

/// Mints a password-reset token that names only `email`.
pub fn issue_reset_token(codec: &TokenCodec, email: &str) -> Result<String> {
    codec.sign(&Subject::email_only(email), TokenType::Reset)
}
