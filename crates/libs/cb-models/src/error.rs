//! Persistence error types.

/// User store errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Database connection pool error.
    #[error(transparent)]
    R2D2(#[from] diesel::r2d2::PoolError),

    /// Diesel ORM operation error.
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error("Failed to run database migrations: {0}")]
    Migration(String),

    #[error("Env Variable '{0}' missing")]
    MissingEnv(&'static str),

    /// Hashing failures and corrupt stored roles.
    #[error(transparent)]
    Auth(#[from] cb_auth::error::Error),

    /// A unique field (`username` or `email`) is already taken.
    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("In-memory store lock poisoned")]
    LockPoisoned,
}
