//! User records and persistence for the community board.
//!
//! The token engine never talks to a database directly; it goes through the
//! [`UserStore`](user::store::UserStore) contract. Two implementations ship:
//! the Diesel/PostgreSQL [`DbConnection`](db::connection::DbConnection) and
//! the in-process [`MemoryUserStore`](user::memory::MemoryUserStore).
//!
//! # Usage
//!
//! ```rust,no_run
//! use cb_models::{
//!     db::{config::DbConfig, connection::DbConnection},
//!     user::store::UserStore,
//! };
//!
//! let db = DbConnection::new(&DbConfig::from_env().unwrap()).unwrap().setup().unwrap();
//! let user = db.find_credential_by_email("ada@example.com").unwrap();
//! println!("Found user: {}", user.is_some());
//! ```

pub mod db;
pub mod error;
pub mod prelude;
mod schema;
pub mod user;
