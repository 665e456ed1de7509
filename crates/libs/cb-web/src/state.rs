//! Shared state handed to every handler and middleware.

use std::sync::Arc;

use cb_auth::jwt::TokenCodec;
use cb_models::user::store::UserStore;

use crate::{
    rate_limit::{RateLimitPolicy, RateLimiter},
    reset::{LogResetSink, ResetTokenSink},
};

/// One limiter per named policy.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub general: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
    pub password_reset: Arc<RateLimiter>,
}

impl RateLimits {
    pub fn new(
        general: RateLimitPolicy,
        auth: RateLimitPolicy,
        password_reset: RateLimitPolicy,
    ) -> Self {
        Self {
            general: Arc::new(RateLimiter::new(general)),
            auth: Arc::new(RateLimiter::new(auth)),
            password_reset: Arc::new(RateLimiter::new(password_reset)),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(
            RateLimitPolicy::general(),
            RateLimitPolicy::auth(),
            RateLimitPolicy::password_reset(),
        )
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub codec: Arc<TokenCodec>,
    pub store: Arc<dyn UserStore>,
    pub reset_sink: Arc<dyn ResetTokenSink>,
    /// Sets the `Secure` attribute on the refresh cookie.
    pub secure_cookies: bool,
    pub limits: RateLimits,
}

impl ApiState {
    pub fn new(codec: TokenCodec, store: Arc<dyn UserStore>) -> Self {
        Self {
            codec: Arc::new(codec),
            store,
            reset_sink: Arc::new(LogResetSink),
            secure_cookies: false,
            limits: RateLimits::default(),
        }
    }

    pub fn with_reset_sink(mut self, reset_sink: Arc<dyn ResetTokenSink>) -> Self {
        self.reset_sink = reset_sink;
        self
    }

    pub fn with_secure_cookies(mut self, secure_cookies: bool) -> Self {
        self.secure_cookies = secure_cookies;
        self
    }

    pub fn with_rate_limits(mut self, limits: RateLimits) -> Self {
        self.limits = limits;
        self
    }
}
