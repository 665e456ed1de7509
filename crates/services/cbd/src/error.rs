//! Error types for the community board service.
//!
//! Everything here is fatal: the process logs it and exits.

/// Errors that stop the service from starting or keep it from serving.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// Missing or unusable token secrets and lifetimes.
    #[error(transparent)]
    Auth(#[from] cb_auth::error::Error),

    #[error(transparent)]
    Model(#[from] cb_models::error::Error),

    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}
