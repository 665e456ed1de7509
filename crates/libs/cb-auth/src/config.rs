//! Token codec configuration.
//!
//! Secrets and lifetimes are collected once, at startup, into a [`TokenConfig`]
//! that is handed to [`TokenCodec::new`](crate::jwt::TokenCodec::new). Nothing
//! reads the environment after that.

use std::fmt::{Debug, Display};

use chrono::TimeDelta;

use crate::{ISS, jwt::TokenType, prelude::*};

pub const ENV_DEFAULT_SECRET: &str = "JWT_SECRET";
pub const ENV_ACCESS_SECRET: &str = "JWT_ACCESS_SECRET";
pub const ENV_REFRESH_SECRET: &str = "JWT_REFRESH_SECRET";
pub const ENV_RESET_SECRET: &str = "JWT_RESET_SECRET";
pub const ENV_ACCESS_TTL: &str = "JWT_ACCESS_EXPIRES_IN";
pub const ENV_REFRESH_TTL: &str = "JWT_REFRESH_EXPIRES_IN";
pub const ENV_RESET_TTL: &str = "JWT_RESET_EXPIRES_IN";

pub const DEFAULT_ACCESS_TTL: TimeDelta = TimeDelta::minutes(15);
pub const DEFAULT_REFRESH_TTL: TimeDelta = TimeDelta::days(7);
pub const DEFAULT_RESET_TTL: TimeDelta = TimeDelta::hours(1);

/// Secrets and lifetimes for each token type.
///
/// A type without its own secret falls back to `default_secret`.
#[derive(Clone)]
pub struct TokenConfig {
    pub default_secret: Option<String>,
    pub access_secret: Option<String>,
    pub refresh_secret: Option<String>,
    pub reset_secret: Option<String>,
    pub access_ttl: TimeDelta,
    pub refresh_ttl: TimeDelta,
    pub reset_ttl: TimeDelta,
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_secret: None,
            access_secret: None,
            refresh_secret: None,
            reset_secret: None,
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            reset_ttl: DEFAULT_RESET_TTL,
            issuer: String::from(ISS),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_ttl(name: &str, default: TimeDelta) -> Result<TimeDelta> {
    match env_var(name) {
        Some(value) => parse_ttl(&value)
            .map_err(|_| Error::Configuration(format!("{name} has an invalid duration '{value}'"))),
        None => Ok(default),
    }
}

impl TokenConfig {
    /// Configuration with a single shared secret and default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            default_secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Reads secrets and lifetimes from `JWT_*` environment variables.
    ///
    /// Missing secrets are not an error here; [`TokenCodec::new`](crate::jwt::TokenCodec::new)
    /// decides whether what was found is enough.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            default_secret: env_var(ENV_DEFAULT_SECRET),
            access_secret: env_var(ENV_ACCESS_SECRET),
            refresh_secret: env_var(ENV_REFRESH_SECRET),
            reset_secret: env_var(ENV_RESET_SECRET),
            access_ttl: env_ttl(ENV_ACCESS_TTL, DEFAULT_ACCESS_TTL)?,
            refresh_ttl: env_ttl(ENV_REFRESH_TTL, DEFAULT_REFRESH_TTL)?,
            reset_ttl: env_ttl(ENV_RESET_TTL, DEFAULT_RESET_TTL)?,
            issuer: String::from(ISS),
        })
    }

    /// The secret a token of `token_type` is signed with, after fallback.
    pub fn secret_for(&self, token_type: TokenType) -> Option<&str> {
        let specific = match token_type {
            TokenType::Access => &self.access_secret,
            TokenType::Refresh => &self.refresh_secret,
            TokenType::Reset => &self.reset_secret,
        };
        specific
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .or_else(|| {
                self.default_secret
                    .as_deref()
                    .filter(|secret| !secret.is_empty())
            })
    }

    pub fn ttl_for(&self, token_type: TokenType) -> TimeDelta {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
            TokenType::Reset => self.reset_ttl,
        }
    }
}

impl Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "REDACTED");
        f.debug_struct("TokenConfig")
            .field("default_secret", &redact(&self.default_secret))
            .field("access_secret", &redact(&self.access_secret))
            .field("refresh_secret", &redact(&self.refresh_secret))
            .field("reset_secret", &redact(&self.reset_secret))
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("reset_ttl", &self.reset_ttl)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl Display for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "access {}s, refresh {}s, reset {}s, secrets REDACTED",
            self.access_ttl.num_seconds(),
            self.refresh_ttl.num_seconds(),
            self.reset_ttl.num_seconds()
        )
    }
}

/// Parses lifetimes written as `900`, `30s`, `15m`, `1h` or `7d`.
///
/// ```rust
/// use cb_auth::config::parse_ttl;
/// use chrono::TimeDelta;
///
/// assert_eq!(parse_ttl("15m").unwrap(), TimeDelta::minutes(15));
/// assert_eq!(parse_ttl("7d").unwrap(), TimeDelta::days(7));
/// assert_eq!(parse_ttl("900").unwrap(), TimeDelta::seconds(900));
/// assert!(parse_ttl("soon").is_err());
/// ```
pub fn parse_ttl(value: &str) -> Result<TimeDelta> {
    let value = value.trim();
    let invalid = || Error::Configuration(format!("invalid duration '{value}'"));

    let (amount, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => value.split_at(split),
        None => (value, "s"),
    };
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let ttl = match unit {
        "s" => TimeDelta::try_seconds(amount),
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        _ => None,
    };
    ttl.ok_or_else(invalid)
}
