//! Request throttling.
//!
//! Each [`RateLimiter`] enforces one named [`RateLimitPolicy`] with fixed
//! windows. Requests are bucketed by [`rate_limit_key`]: the authenticated
//! user when there is one, the peer address otherwise.

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cb_auth::role::Identity;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::{ctx::Ctx, prelude::*};

pub const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Above this many tracked keys, expired windows are dropped on a hit, at most
/// once per window length.
const PRUNE_THRESHOLD: usize = 10_000;

/// Window, budget and counting rule of one limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u32,
    /// Requests answered with a status below 400 are given back.
    pub skip_successful_requests: bool,
}

impl RateLimitPolicy {
    /// Loose limit applied to all traffic.
    pub const fn general() -> Self {
        Self {
            name: "general",
            window: Duration::from_secs(15 * 60),
            max_requests: 100,
            skip_successful_requests: false,
        }
    }

    /// Login and registration attempts. Only failures count.
    pub const fn auth() -> Self {
        Self {
            name: "auth",
            window: Duration::from_secs(15 * 60),
            max_requests: 5,
            skip_successful_requests: true,
        }
    }

    /// Password reset requests.
    pub const fn password_reset() -> Self {
        Self {
            name: "password_reset",
            window: Duration::from_secs(60 * 60),
            max_requests: 3,
            skip_successful_requests: false,
        }
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_in: Duration,
    window_start: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

#[derive(Debug)]
struct Windows {
    by_key: HashMap<String, Window>,
    last_prune: Instant,
}

impl Windows {
    fn prune_expired(&mut self, now: Instant, length: Duration) {
        let before = self.by_key.len();
        self.by_key
            .retain(|_, window| now.duration_since(window.start) < length);
        self.last_prune = now;
        debug!("Pruned {} expired rate limit windows", before - self.by_key.len());
    }
}

/// Fixed-window request counter shared by all requests of one policy.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(Windows {
                by_key: HashMap::new(),
                last_prune: Instant::now(),
            }),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Counts one request against `key` and decides whether it may proceed.
    ///
    /// Increment and check happen under one lock. A refused request is not
    /// counted.
    pub async fn hit(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.by_key.len() >= PRUNE_THRESHOLD
            && now.duration_since(windows.last_prune) >= self.policy.window
        {
            windows.prune_expired(now, self.policy.window);
        }

        let window = windows.by_key.entry(key.to_string()).or_insert(Window {
            start: now,
            count: 0,
        });
        if now.duration_since(window.start) >= self.policy.window {
            *window = Window {
                start: now,
                count: 0,
            };
        }

        let allowed = window.count < self.policy.max_requests;
        if allowed {
            window.count += 1;
        }

        RateLimitDecision {
            allowed,
            limit: self.policy.max_requests,
            remaining: self.policy.max_requests.saturating_sub(window.count),
            reset_in: self
                .policy
                .window
                .saturating_sub(now.duration_since(window.start)),
            window_start: window.start,
        }
    }

    /// Gives back a request counted by `decision`, if its window is still open.
    pub async fn release(&self, key: &str, decision: &RateLimitDecision) {
        let mut windows = self.windows.lock().await;
        if let Some(window) = windows.by_key.get_mut(key) {
            if window.start == decision.window_start {
                window.count = window.count.saturating_sub(1);
            }
        }
    }

    /// Drops every window that has already closed.
    pub async fn prune(&self) {
        self.windows
            .lock()
            .await
            .prune_expired(Instant::now(), self.policy.window);
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.by_key.len()
    }
}

/// Bucketing key of a request.
///
/// ```rust
/// use std::net::{IpAddr, Ipv4Addr};
///
/// use cb_auth::role::{Identity, Role};
/// use cb_web::rate_limit::rate_limit_key;
/// use uuid::Uuid;
///
/// let id = Uuid::new_v4();
/// let user = Identity::new(id, "a@example.com", Role::User);
/// let addr = Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)));
///
/// assert_eq!(rate_limit_key(Some(&user), addr), format!("user:{id}"));
/// assert_eq!(rate_limit_key(None, addr), "203.0.113.7");
/// ```
pub fn rate_limit_key(identity: Option<&Identity>, addr: Option<IpAddr>) -> String {
    match (identity, addr) {
        (Some(identity), _) => format!("user:{}", identity.user_id),
        (None, Some(addr)) => addr.to_string(),
        (None, None) => String::from("unknown"),
    }
}

/// Admins and operational endpoints are never throttled.
pub fn is_exempt(path: &str, identity: Option<&Identity>) -> bool {
    identity.is_some_and(Identity::is_admin)
        || path == "/health"
        || path == "/docs"
        || path.starts_with("/docs/")
}

/// The innermost limiter wins when several apply to one route.
fn set_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers
        .entry(HEADER_LIMIT)
        .or_insert_with(|| HeaderValue::from(limit));
    headers
        .entry(HEADER_REMAINING)
        .or_insert_with(|| HeaderValue::from(remaining));
}

/// Middleware applying one limiter to the routes it wraps.
///
/// Must run inside [`mw_ctx_resolver`](crate::ctx::resolver::mw_ctx_resolver)
/// so authenticated callers are bucketed by user.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use axum::{Router, middleware, routing::post};
/// use cb_web::rate_limit::{RateLimitPolicy, RateLimiter, mw_rate_limit};
///
/// let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::auth()));
/// let app: Router<()> = Router::new()
///     .route("/login", post(login))
///     .route_layer(middleware::from_fn_with_state(limiter, mw_rate_limit));
///
/// async fn login() -> &'static str {
///     "welcome"
/// }
/// ```
pub async fn mw_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    ctx: Option<Ctx>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let identity = ctx.as_ref().map(|ctx| &ctx.identity);
    if is_exempt(req.uri().path(), identity) {
        return Ok(next.run(req).await);
    }

    let addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let key = rate_limit_key(identity, addr);
    let decision = limiter.hit(&key).await;

    if !decision.allowed {
        warn!("Rate limit '{}' exceeded for {}", limiter.policy().name, key);
        let mut response = Error::RateLimitExceeded {
            retry_after: decision.reset_in,
        }
        .into_response();
        set_limit_headers(response.headers_mut(), decision.limit, 0);
        return Ok(response);
    }

    let mut response = next.run(req).await;

    let mut remaining = decision.remaining;
    if limiter.policy().skip_successful_requests && response.status().as_u16() < 400 {
        limiter.release(&key, &decision).await;
        remaining = (remaining + 1).min(decision.limit);
    }
    set_limit_headers(response.headers_mut(), decision.limit, remaining);

    Ok(response)
}
