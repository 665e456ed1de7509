//! Web layer of the community board authentication service.
//!
//! This library resolves the caller of every request from its bearer token,
//! gates routes by role, throttles abusive clients and exposes the account
//! operations (register, login, refresh, password reset, ...) as an axum
//! router.

pub mod account;
pub mod api;
pub mod cookie;
pub mod ctx;
pub mod error;
pub mod mw_auth;
pub mod prelude;
pub mod rate_limit;
pub mod refresh;
pub mod reset;
pub mod state;
pub mod validation;
