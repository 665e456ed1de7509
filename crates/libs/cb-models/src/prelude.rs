//! Common types and utilities.

/// Persistence error type.
pub use crate::error::Error;

/// Persistence result type.
pub type Result<T> = core::result::Result<T, Error>;
