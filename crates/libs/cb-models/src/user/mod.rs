//! Board members, their credentials and where they are stored.

pub mod account;
pub mod credential;
pub mod db;
pub mod memory;
pub mod store;
