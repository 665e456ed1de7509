//! Authentication middleware for protecting routes.
//!
//! This module provides middleware functions and macros for protecting routes
//! that require authentication and specific roles.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use cb_auth::role::{Identity, Role};
use tracing::debug;

use super::ctx::Ctx;
use crate::prelude::*;

/// Middleware that requires authentication for a route.
///
/// This middleware checks if a valid authentication context exists.
/// If no valid context is found, the request is rejected with the reason the
/// bearer token was turned down.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use cb_web::mw_auth::mw_require_auth;
///
/// let app: Router<()> = Router::new()
///     .route("/protected", get(protected_handler))
///     .layer(axum::middleware::from_fn(mw_require_auth));
///
/// async fn protected_handler() -> &'static str {
///     "This requires authentication"
/// }
/// ```
pub async fn mw_require_auth(ctx: Result<Ctx>, req: Request, next: Next) -> Result<Response> {
    ctx?;
    Ok(next.run(req).await)
}

/// Decides whether `identity` may use an operation gated to `allowed`.
///
/// ```rust
/// use cb_auth::role::{Identity, Role};
/// use cb_web::{error::Error, mw_auth::authorize};
/// use uuid::Uuid;
///
/// let moderator = Identity::new(Uuid::new_v4(), "mod@example.com", Role::Moderator);
/// assert!(authorize(Some(&moderator), &[Role::Moderator, Role::Admin]).is_ok());
///
/// match authorize(Some(&moderator), &[Role::Admin]) {
///     Err(Error::InsufficientPermissions { required_roles, user_role }) => {
///         assert_eq!(required_roles, vec![Role::Admin]);
///         assert_eq!(user_role, Role::Moderator);
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub fn authorize(identity: Option<&Identity>, allowed: &[Role]) -> Result<()> {
    let identity = identity.ok_or(Error::NotAuthenticated)?;
    if !identity.role.is_any_of(allowed) {
        debug!(
            "User {} with role {} denied, requires one of {:?}",
            identity.user_id, identity.role, allowed
        );
        return Err(Error::InsufficientPermissions {
            required_roles: allowed.to_vec(),
            user_role: identity.role,
        });
    }
    Ok(())
}

/// Middleware that requires one of a set of roles for a route.
///
/// Runs after authentication: a request without an authenticated caller is
/// rejected with [`Error::NotAuthenticated`].
///
/// # Examples
///
/// ```rust
/// use axum::{Router, routing::get};
/// use cb_auth::role::Role;
/// use cb_web::mw_auth::mw_require_role;
///
/// const STAFF: &[Role] = &[Role::Moderator, Role::Admin];
///
/// let app: Router<()> = Router::new()
///     .route("/reports", get(reports_handler))
///     .layer(axum::middleware::from_fn_with_state(STAFF, mw_require_role));
///
/// async fn reports_handler() -> &'static str {
///     "Staff only"
/// }
/// ```
pub async fn mw_require_role(
    State(allowed): State<&'static [Role]>,
    ctx: Option<Ctx>,
    req: Request,
    next: Next,
) -> Result<Response> {
    authorize(ctx.as_ref().map(|ctx| &ctx.identity), allowed)?;
    Ok(next.run(req).await)
}

/// A macro for creating role-gated middleware.
///
/// # Examples
///
/// ```rust
/// use axum::{Router, routing::get};
/// use cb_auth::role::Role;
/// use cb_web::require_role;
///
/// let app: Router<()> = Router::new()
///     .route("/admin", get(admin_handler))
///     .layer(require_role!(Role::Admin))
///     .route("/reports", get(reports_handler))
///     .layer(require_role!(Role::Moderator, Role::Admin));
///
/// async fn admin_handler() -> &'static str {
///     "Admin only"
/// }
///
/// async fn reports_handler() -> &'static str {
///     "Staff only"
/// }
/// ```
#[macro_export]
macro_rules! require_role {
    ($($role:expr),+ $(,)?) => {{
        let allowed: &'static [_] = &[$($role),+];
        axum::middleware::from_fn_with_state(allowed, $crate::mw_auth::mw_require_role)
    }};
}
