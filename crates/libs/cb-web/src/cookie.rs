//! The refresh token cookie.

use cb_auth::config::TokenConfig;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time::Duration},
};

pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Stores `token` in an HTTP-only, same-site-strict cookie that lives as long
/// as the refresh token itself.
pub fn set_refresh_cookie(cookies: &Cookies, config: &TokenConfig, token: &str, secure: bool) {
    let cookie = Cookie::build((REFRESH_TOKEN_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(Duration::seconds(config.refresh_ttl.num_seconds()))
        .build();
    cookies.add(cookie);
}

pub fn read_refresh_cookie(cookies: &Cookies) -> Option<String> {
    cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

pub fn clear_refresh_cookie(cookies: &Cookies) {
    cookies.remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/").build());
}
