use crate::jwt::TokenType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed Token")]
    TokenMalformed,
    #[error("Token Expired")]
    TokenExpired,
    #[error("Invalid Token Type: expected {expected}, got {actual}")]
    InvalidTokenType {
        expected: TokenType,
        actual: TokenType,
    },
    #[error("Token Revoked")]
    TokenRevoked,
    #[error(transparent)]
    TokenCreation(#[from] jsonwebtoken::errors::Error),

    #[error("Error hashing password {0}")]
    PasswordHash(argon2::password_hash::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Invalid role '{0}'")]
    InvalidRole(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
