//! Service configuration read from the environment.

use std::{fmt::Display, net::SocketAddr};

use crate::prelude::*;

pub const ENV_ADDR: &str = "CBD_ADDR";
pub const ENV_SECURE_COOKIES: &str = "CBD_SECURE_COOKIES";
pub const ENV_MEMORY_STORE: &str = "CBD_MEMORY_STORE";

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Marks the refresh cookie `Secure`; enable behind HTTPS.
    pub secure_cookies: bool,
    /// Keep users in memory instead of PostgreSQL.
    pub memory_store: bool,
}

fn env_var(var: &'static str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

fn env_flag(var: &'static str) -> Result<bool> {
    match env_var(var) {
        None => Ok(false),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::InvalidEnv { var, value }),
        },
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let addr = env_var(ENV_ADDR).unwrap_or_else(|| String::from(DEFAULT_ADDR));
        let addr = addr.parse().map_err(|_| Error::InvalidEnv {
            var: ENV_ADDR,
            value: addr.clone(),
        })?;

        Ok(Self {
            addr,
            secure_cookies: env_flag(ENV_SECURE_COOKIES)?,
            memory_store: env_flag(ENV_MEMORY_STORE)?,
        })
    }
}

impl Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "addr {}, secure cookies {}, store {}",
            self.addr,
            self.secure_cookies,
            if self.memory_store { "memory" } else { "postgres" }
        )
    }
}
