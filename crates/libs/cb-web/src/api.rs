//! HTTP surface of the service.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use cb_auth::role::Role;
use cb_models::user::account::ProfileUpdate;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_cookies::{CookieManagerLayer, Cookies};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use uuid::Uuid;

use crate::{
    account::{
        self, ApiResponse, AuthData, ChangePasswordRequest, FORGOT_PASSWORD_MESSAGE,
        ForgotPasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
        ResetPasswordRequest, StatusRequest, TokenData, UserData,
    },
    cookie::{clear_refresh_cookie, read_refresh_cookie, set_refresh_cookie},
    ctx::{Ctx, resolver::mw_ctx_resolver},
    mw_auth::mw_require_auth,
    prelude::*,
    rate_limit::mw_rate_limit,
    require_role,
    state::ApiState,
};

/// JSON body whose rejections use the service's error format.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(Error))]
pub struct Payload<T>(pub T);

/// `{id}` path segment parsed as a user id.
#[derive(Deserialize, FromRequestParts)]
#[serde(transparent)]
#[from_request(via(Path), rejection(Error))]
pub struct UserId(pub Uuid);

pub fn v1(path: &str) -> String {
    format!("/v1/{path}")
}

/// Builds the application router.
///
/// Every request goes through the context resolver and the general rate
/// limiter; login and registration add the auth limiter, the password reset
/// endpoints the reset limiter.
pub fn router(state: ApiState) -> Router {
    let credential_routes = Router::new()
        .route(&v1("auth/register"), post(register))
        .route(&v1("auth/login"), post(login))
        .route_layer(middleware::from_fn_with_state(
            state.limits.auth.clone(),
            mw_rate_limit,
        ));

    let reset_routes = Router::new()
        .route(&v1("auth/forgot-password"), post(forgot_password))
        .route(&v1("auth/reset-password"), post(reset_password))
        .route_layer(middleware::from_fn_with_state(
            state.limits.password_reset.clone(),
            mw_rate_limit,
        ));

    let session_routes = Router::new()
        .route(&v1("auth/logout"), post(logout))
        .route(&v1("auth/refresh-token"), post(refresh_token));

    let account_routes = Router::new()
        .route(&v1("auth/me"), get(me).put(update_me))
        .route(&v1("auth/change-password"), put(change_password))
        .route_layer(middleware::from_fn(mw_require_auth));

    let staff_routes = Router::new()
        .route(&v1("users/{id}"), get(get_user))
        .route_layer(require_role!(Role::Moderator, Role::Admin))
        .route_layer(middleware::from_fn(mw_require_auth));

    let admin_routes = Router::new()
        .route(&v1("admin/users/{id}/status"), put(set_user_status))
        .route_layer(require_role!(Role::Admin))
        .route_layer(middleware::from_fn(mw_require_auth));

    Router::new()
        .merge(credential_routes)
        .merge(reset_routes)
        .merge(session_routes)
        .merge(account_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.limits.general.clone(),
            mw_rate_limit,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            mw_ctx_resolver,
        ))
        .layer(CookieManagerLayer::new())
        .with_state(state)
}

/// Serves the router until the listener fails.
///
/// Peer addresses are recorded for the rate limiter.
pub async fn serve(listener: TcpListener, state: ApiState) -> std::io::Result<()> {
    tracing::debug!("listening on {:?}", listener.local_addr());
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}

async fn register(
    State(state): State<ApiState>,
    cookies: Cookies,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>)> {
    let auth = account::register(&state, payload).await?;
    set_refresh_cookie(
        &cookies,
        state.codec.config(),
        &auth.tokens.refresh_token,
        state.secure_cookies,
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(auth).with_message("User registered successfully")),
    ))
}

async fn login(
    State(state): State<ApiState>,
    cookies: Cookies,
    Payload(payload): Payload<LoginRequest>,
) -> Result<Json<ApiResponse<AuthData>>> {
    let auth = account::login(&state, payload).await?;
    set_refresh_cookie(
        &cookies,
        state.codec.config(),
        &auth.tokens.refresh_token,
        state.secure_cookies,
    );
    Ok(Json(ApiResponse::data(auth).with_message("Login successful")))
}

async fn logout(State(state): State<ApiState>, cookies: Cookies) -> Json<ApiResponse<()>> {
    account::logout(&state, read_refresh_cookie(&cookies).as_deref());
    clear_refresh_cookie(&cookies);
    Json(ApiResponse::message("Logout successful"))
}

/// Reads `refresh_token` from an optional JSON body, falling back to the cookie.
async fn refresh_token(
    State(state): State<ApiState>,
    cookies: Cookies,
    body: Bytes,
) -> Result<Json<ApiResponse<TokenData>>> {
    let payload: RefreshRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| Error::Validation(err.to_string()))?
    };
    let token = payload
        .refresh_token
        .filter(|token| !token.is_empty())
        .or_else(|| read_refresh_cookie(&cookies));

    let tokens = account::refresh(&state, token.as_deref()).await?;
    Ok(Json(ApiResponse::data(TokenData { tokens })))
}

async fn me(State(state): State<ApiState>, ctx: Ctx) -> Result<Json<ApiResponse<UserData>>> {
    let user = account::current_user(&state, &ctx).await?;
    Ok(Json(ApiResponse::data(UserData { user })))
}

async fn update_me(
    State(state): State<ApiState>,
    ctx: Ctx,
    Payload(update): Payload<ProfileUpdate>,
) -> Result<Json<ApiResponse<UserData>>> {
    let user = account::update_current_user(&state, &ctx, update).await?;
    Ok(Json(
        ApiResponse::data(UserData { user }).with_message("Profile updated successfully"),
    ))
}

async fn change_password(
    State(state): State<ApiState>,
    ctx: Ctx,
    Payload(payload): Payload<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    account::change_password(&state, &ctx, payload).await?;
    Ok(Json(ApiResponse::message("Password changed successfully")))
}

async fn forgot_password(
    State(state): State<ApiState>,
    Payload(payload): Payload<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    account::forgot_password(&state, payload).await?;
    Ok(Json(ApiResponse::message(FORGOT_PASSWORD_MESSAGE)))
}

async fn reset_password(
    State(state): State<ApiState>,
    Payload(payload): Payload<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    account::reset_password(&state, payload).await?;
    Ok(Json(ApiResponse::message("Password reset successfully")))
}

async fn get_user(
    State(state): State<ApiState>,
    UserId(id): UserId,
) -> Result<Json<ApiResponse<UserData>>> {
    let user = account::find_user(&state, &id).await?;
    Ok(Json(ApiResponse::data(UserData { user })))
}

async fn set_user_status(
    State(state): State<ApiState>,
    ctx: Ctx,
    UserId(id): UserId,
    Payload(payload): Payload<StatusRequest>,
) -> Result<Json<ApiResponse<UserData>>> {
    let user = account::set_user_active(&state, &ctx, &id, payload.is_active).await?;
    Ok(Json(ApiResponse::data(UserData { user })))
}
