//! Context resolver for extracting the caller from HTTP requests.
//!
//! [`mw_ctx_resolver`] runs on every request and never rejects anything: it
//! stores the outcome of bearer-token verification in the request extensions.
//! Handlers then pick their policy by what they extract:
//!
//! * `Ctx` - mandatory authentication, fails with the stored rejection.
//! * `Option<Ctx>` - optional authentication, any token problem reads as
//!   "anonymous".

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use cb_auth::{
    AUTH_HEADER, AUTH_HEADER_PREFIX,
    error::Error as AuthError,
    jwt::{TokenCodec, TokenType},
    role::Identity,
};
use tracing::debug;

use crate::{ctx::Ctx, prelude::*, state::ApiState};

/// Why a request carries no usable access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    NoToken,
    Malformed,
    Expired,
    InvalidType,
}

impl From<TokenRejection> for Error {
    fn from(value: TokenRejection) -> Self {
        match value {
            TokenRejection::NoToken => Error::NoToken,
            TokenRejection::Malformed => Error::MalformedToken,
            TokenRejection::Expired => Error::TokenExpired,
            TokenRejection::InvalidType => Error::InvalidTokenType,
        }
    }
}

/// What [`mw_ctx_resolver`] leaves in the request extensions.
pub type CtxResult = std::result::Result<Ctx, TokenRejection>;

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|value| value.strip_prefix(AUTH_HEADER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies the bearer token of a request as an access token.
///
/// A missing header, a header without the `Bearer ` scheme or an empty token
/// all count as [`TokenRejection::NoToken`].
pub fn authenticate_bearer(
    codec: &TokenCodec,
    header: Option<&str>,
) -> std::result::Result<Identity, TokenRejection> {
    let token = bearer_token(header).ok_or(TokenRejection::NoToken)?;

    let claims = codec
        .verify(token, TokenType::Access)
        .map_err(|err| match err {
            AuthError::TokenExpired => TokenRejection::Expired,
            AuthError::InvalidTokenType { .. } => TokenRejection::InvalidType,
            _ => TokenRejection::Malformed,
        })?;

    claims.identity().ok_or(TokenRejection::Malformed)
}

/// Middleware resolving the request context from the bearer token.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, middleware};
/// use cb_web::{ctx::resolver::mw_ctx_resolver, state::ApiState};
///
/// fn app(state: ApiState) -> Router {
///     Router::new()
///         .layer(middleware::from_fn_with_state(state.clone(), mw_ctx_resolver))
///         .with_state(state)
/// }
/// ```
pub async fn mw_ctx_resolver(
    State(state): State<ApiState>,
    headers: HeaderMap,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let header = headers.get(AUTH_HEADER).and_then(|h| h.to_str().ok());
    let ctx: CtxResult = authenticate_bearer(&state.codec, header).map(Ctx::new);

    match &ctx {
        Ok(ctx) => debug!("Authenticated user {} ({})", ctx.user_id(), ctx.role()),
        Err(TokenRejection::NoToken) => {}
        Err(rejection) => debug!("Access token rejected: {rejection:?}"),
    }
    req.extensions_mut().insert(ctx);

    next.run(req).await
}

impl<S: Send + Sync> FromRequestParts<S> for Ctx {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Ok(parts
            .extensions
            .get::<CtxResult>()
            .ok_or(Error::NotAuthenticated)?
            .clone()?)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for Ctx {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CtxResult>()
            .and_then(|ctx| ctx.clone().ok()))
    }
}

#[cfg(test)]
mod tests {
    use cb_auth::{config::TokenConfig, jwt::Subject, role::Role};
    use chrono::{TimeDelta, Utc};
    use uuid::Uuid;

    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig::with_secret("resolver-secret")).unwrap()
    }

    fn identity() -> Identity {
        Identity::new(Uuid::new_v4(), "reader@example.com", Role::User)
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(Some("abc.def.ghi")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn valid_access_token_yields_identity() {
        let codec = codec();
        let identity = identity();
        let token = codec.sign(&Subject::from(&identity), TokenType::Access).unwrap();

        let resolved = authenticate_bearer(&codec, Some(&format!("Bearer {token}")));
        assert_eq!(resolved, Ok(identity));
    }

    #[test]
    fn each_failure_has_its_own_rejection() {
        let codec = codec();
        let subject = Subject::from(&identity());
        let refresh = codec.sign(&subject, TokenType::Refresh).unwrap();
        let expired = codec
            .sign_at(&subject, TokenType::Access, Utc::now() - TimeDelta::hours(1))
            .unwrap();

        assert_eq!(
            authenticate_bearer(&codec, None),
            Err(TokenRejection::NoToken)
        );
        assert_eq!(
            authenticate_bearer(&codec, Some("Token abc")),
            Err(TokenRejection::NoToken)
        );
        assert_eq!(
            authenticate_bearer(&codec, Some("Bearer not-a-jwt")),
            Err(TokenRejection::Malformed)
        );
        assert_eq!(
            authenticate_bearer(&codec, Some(&format!("Bearer {expired}"))),
            Err(TokenRejection::Expired)
        );
        assert_eq!(
            authenticate_bearer(&codec, Some(&format!("Bearer {refresh}"))),
            Err(TokenRejection::InvalidType)
        );
    }

    #[test]
    fn token_without_identity_is_malformed() {
        let codec = codec();
        let token = codec
            .sign(&Subject::email_only("anon@example.com"), TokenType::Access)
            .unwrap();

        assert_eq!(
            authenticate_bearer(&codec, Some(&format!("Bearer {token}"))),
            Err(TokenRejection::Malformed)
        );
    }
}
