//! Typed, expiring bearer tokens.
//!
//! Every token carries a `type` claim (`access`, `refresh` or `reset`) and is
//! signed with the secret configured for that type. [`TokenCodec::verify`]
//! selects the key by the *expected* type and then cross-checks the decoded
//! claim, so a token can only ever be accepted where its own type is expected,
//! even when all three types share one secret.
//!
//! # Examples
//!
//! ```rust
//! use cb_auth::{
//!     config::TokenConfig,
//!     error::Error,
//!     jwt::{Subject, TokenCodec, TokenType},
//!     role::{Identity, Role},
//! };
//! use uuid::Uuid;
//!
//! let codec = TokenCodec::new(TokenConfig::with_secret("MySuperSecret")).unwrap();
//! let identity = Identity::new(Uuid::new_v4(), "ada@example.com", Role::User);
//!
//! let token = codec.sign(&Subject::from(&identity), TokenType::Access).unwrap();
//! let claims = codec.verify(&token, TokenType::Access).unwrap();
//! assert_eq!(claims.identity(), Some(identity));
//!
//! assert!(matches!(
//!     codec.verify(&token, TokenType::Refresh),
//!     Err(Error::InvalidTokenType { .. })
//! ));
//! ```

use std::{collections::HashSet, fmt::Display, sync::Arc};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    config::TokenConfig,
    prelude::*,
    role::{Identity, Role},
};

/// JWT signing algorithm used for every token type.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// The purpose a token was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
    Reset,
}

impl TokenType {
    pub const ALL: [TokenType; 3] = [TokenType::Access, TokenType::Refresh, TokenType::Reset];
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::Reset => "reset",
        })
    }
}

/// Who a token is about.
///
/// Access and refresh tokens carry the full identity; reset tokens only the email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Option<Uuid>,
    pub email: String,
    pub role: Option<Role>,
}

impl Subject {
    pub fn email_only(email: impl Into<String>) -> Self {
        Self {
            user_id: None,
            email: email.into(),
            role: None,
        }
    }
}

impl From<&Identity> for Subject {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: Some(identity.user_id),
            email: identity.email.clone(),
            role: Some(identity.role),
        }
    }
}

/// Claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Uuid>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issuer.
    pub iss: String,
    /// Issued at time.
    pub iat: i64,
    /// Expiration time.
    pub exp: i64,
    /// JWT ID.
    pub jti: Uuid,
}

impl Claims {
    /// The principal of an access or refresh token.
    ///
    /// `None` when the token does not name both a user and a role.
    pub fn identity(&self) -> Option<Identity> {
        Some(Identity {
            user_id: self.sub?,
            email: self.email.clone(),
            role: self.role?,
        })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }
}

/// Server-side revocation hook consulted on every verification.
///
/// The service ships without a revocation store: tokens die by expiry only and
/// [`NoDenylist`] is what gets installed. A deployment that needs logout to
/// invalidate refresh tokens plugs its own implementation in with
/// [`TokenCodec::with_denylist`].
pub trait Denylist: Send + Sync {
    fn is_revoked(&self, claims: &Claims) -> bool;

    /// Called on logout with the presented refresh token's claims.
    fn revoke(&self, claims: &Claims);
}

/// Revokes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDenylist;

impl Denylist for NoDenylist {
    fn is_revoked(&self, _claims: &Claims) -> bool {
        false
    }

    fn revoke(&self, claims: &Claims) {
        debug!(
            "No revocation store configured, token {} stays valid until it expires",
            claims.jti
        );
    }
}

/// Signing and verification keys for one token type.
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Signs, verifies and inspects tokens of every type.
///
/// Built once from a [`TokenConfig`]; holds no mutable state and is shared
/// across requests behind an `Arc`.
pub struct TokenCodec {
    config: TokenConfig,
    access: Keys,
    refresh: Keys,
    reset: Keys,
    denylist: Arc<dyn Denylist>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Resolves the secret of every token type.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when some type has neither its own secret nor
    /// the shared default, or when a lifetime is not positive or too large to
    /// add to the current time. This is a deployment error and should stop
    /// startup.
    pub fn new(config: TokenConfig) -> Result<Self> {
        let now = Utc::now();
        for token_type in [TokenType::Access, TokenType::Refresh, TokenType::Reset] {
            let ttl = config.ttl_for(token_type);
            if ttl <= TimeDelta::zero() {
                return Err(Error::Configuration(format!(
                    "{token_type} token lifetime must be positive"
                )));
            }
            if now.checked_add_signed(ttl).is_none() {
                return Err(Error::Configuration(format!(
                    "{token_type} token lifetime overflows"
                )));
            }
        }

        let keys = |token_type: TokenType| {
            config
                .secret_for(token_type)
                .map(|secret| Keys::new(secret.as_bytes()))
                .ok_or_else(|| {
                    Error::Configuration(format!("no secret configured for {token_type} tokens"))
                })
        };

        let access = keys(TokenType::Access)?;
        let refresh = keys(TokenType::Refresh)?;
        let reset = keys(TokenType::Reset)?;

        Ok(Self {
            config,
            access,
            refresh,
            reset,
            denylist: Arc::new(NoDenylist),
        })
    }

    pub fn with_denylist(mut self, denylist: Arc<dyn Denylist>) -> Self {
        self.denylist = denylist;
        self
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn denylist(&self) -> &Arc<dyn Denylist> {
        &self.denylist
    }

    fn keys(&self, token_type: TokenType) -> &Keys {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
            TokenType::Reset => &self.reset,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is compared against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from([String::from("exp")]);
        validation.set_issuer(&[&self.config.issuer]);
        validation
    }

    /// Mints a token of `token_type` for `subject`, issued now.
    pub fn sign(&self, subject: &Subject, token_type: TokenType) -> Result<String> {
        self.sign_at(subject, token_type, Utc::now())
    }

    /// Mints a token as if issued at `now`.
    pub fn sign_at(
        &self,
        subject: &Subject,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let expiration = now
            .checked_add_signed(self.config.ttl_for(token_type))
            .ok_or_else(|| Error::Configuration(format!("{token_type} token lifetime overflows")))?;

        let claims = Claims {
            sub: subject.user_id,
            email: subject.email.clone(),
            role: subject.role,
            token_type,
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.keys(token_type).encoding).map_err(|err| {
            error!("Failed to encode {token_type} JWT {err}");
            Error::TokenCreation(err)
        })
    }

    /// Verifies `token` as a token of `expected` type at the current time.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        self.verify_at(token, expected, Utc::now())
    }

    /// Verifies `token` against the clock value `now`.
    ///
    /// # Errors
    ///
    /// * [`Error::TokenMalformed`] - bad signature, wrong issuer or not a JWT.
    /// * [`Error::TokenExpired`] - `now` is at or past the `exp` claim.
    /// * [`Error::InvalidTokenType`] - valid token of another type.
    /// * [`Error::TokenRevoked`] - rejected by the configured [`Denylist`].
    pub fn verify_at(&self, token: &str, expected: TokenType, now: DateTime<Utc>) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.keys(expected).decoding, &self.validation())
            .map_err(|err| {
                debug!("Rejected {expected} token: {err}");
                Error::TokenMalformed
            })?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(Error::TokenExpired);
        }
        if claims.token_type != expected {
            return Err(Error::InvalidTokenType {
                expected,
                actual: claims.token_type,
            });
        }
        if self.denylist.is_revoked(&claims) {
            return Err(Error::TokenRevoked);
        }

        Ok(claims)
    }

    /// Reads the claims of `token` without checking its signature or expiry.
    ///
    /// For introspection only; never base an authentication decision on it.
    pub fn decode(token: &str) -> Option<Claims> {
        let mut validation = Validation::new(ALGORITHM);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }
}

/// When `token` expires, read without verification.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    TokenCodec::decode(token)?.expires_at()
}

/// Whether `token` is past its expiry. Undecodable tokens count as expired.
pub fn is_token_expired(token: &str) -> bool {
    token_expiry(token).is_none_or(|expiry| expiry <= Utc::now())
}
