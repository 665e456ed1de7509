//! Request context management for web handlers.
//!
//! This module provides the authenticated caller of a request and the
//! middleware that resolves it from the bearer token.

use cb_auth::role::{Identity, Role};
use uuid::Uuid;

pub mod resolver;

/// Request context containing the authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctx {
    pub identity: Identity,
}

impl Ctx {
    /// Creates a new request context.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cb_auth::role::{Identity, Role};
    /// use cb_web::ctx::Ctx;
    /// use uuid::Uuid;
    ///
    /// let user_id = Uuid::new_v4();
    /// let ctx = Ctx::new(Identity::new(user_id, "ada@example.com", Role::User));
    /// assert_eq!(ctx.user_id(), user_id);
    /// assert_eq!(ctx.role(), Role::User);
    /// ```
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn user_id(&self) -> Uuid {
        self.identity.user_id
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }
}
