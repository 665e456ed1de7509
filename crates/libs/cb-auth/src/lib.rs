//! Credential and token engine for the community board.
//!
//! Passwords are stored as Argon2id hashes ([`secret_hash`]); bearer tokens are
//! typed HS256 JWTs minted and checked by the [`jwt::TokenCodec`] and paired up
//! by the [`issuer`].

pub mod auth_body;
pub mod config;
pub mod error;
pub mod issuer;
pub mod jwt;
pub mod prelude;
pub mod role;
pub mod secret_hash;

pub const CONNECTION_TOKEN_TYPE: &str = "Bearer";
pub const AUTH_HEADER: &str = "Authorization";
pub const AUTH_HEADER_PREFIX: &str = "Bearer ";
pub const ISS: &str = "community-board";
