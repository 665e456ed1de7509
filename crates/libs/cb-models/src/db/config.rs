//! Database configuration management.

use std::fmt::Display;

use crate::prelude::*;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Database connection configuration.
pub struct DbConfig {
    /// PostgreSQL database URL.
    pub database_url: String,
}

impl DbConfig {
    /// Create database configuration from environment variables.
    ///
    /// Reads the `DATABASE_URL` environment variable.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use cb_models::db::config::DbConfig;
    ///
    /// let config = DbConfig::from_env().unwrap();
    /// ```
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var(ENV_DATABASE_URL)
            .ok()
            .filter(|url| !url.is_empty())
            .ok_or(Error::MissingEnv(ENV_DATABASE_URL))?;
        Ok(Self { database_url })
    }
}

impl Display for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "REDACTED")
    }
}
