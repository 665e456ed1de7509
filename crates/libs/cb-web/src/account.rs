//! Account operations: registration, login, token refresh, profile and
//! password management.
//!
//! These functions hold the rules; the HTTP wiring (JSON bodies, the refresh
//! cookie) lives in [`api`](crate::api). Password hashing and verification
//! run on the blocking pool so they never stall the async workers.

use std::sync::LazyLock;

use cb_auth::{
    auth_body::{AccessBody, AuthBody},
    issuer::{issue_access_token, issue_auth_tokens, issue_reset_token},
    jwt::TokenType,
};
use cb_models::user::{
    account::{NewUser, ProfileUpdate, User, UserProfile},
    credential::Credential,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    ctx::Ctx,
    prelude::*,
    refresh::{verify_refresh_token, verify_reset_token},
    state::ApiState,
    validation::{
        BIO_MAX, DISPLAY_NAME_MAX, normalize_email, validate_confirmation, validate_email,
        validate_length, validate_password, validate_username,
    },
};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
}

/// Login by email or by username.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct RefreshRequest {
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusRequest {
    #[serde(alias = "isActive")]
    pub is_active: bool,
}

/// Success envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthData {
    pub user: UserProfile,
    pub tokens: AuthBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    pub tokens: AccessBody,
}

async fn blocking<T, E, F>(f: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?.map_err(Into::into)
}

/// Checked when no account matches, so unknown accounts cost one verification
/// like known ones.
static UNKNOWN_ACCOUNT: LazyLock<Option<Credential>> =
    LazyLock::new(|| Credential::from_password("unknown-account-placeholder").ok());

async fn password_matches(credential: Credential, password: String) -> Result<bool> {
    Ok(tokio::task::spawn_blocking(move || credential.verify(&password)).await?)
}

async fn rehash(mut user: User, password: String) -> Result<User> {
    blocking(move || {
        user.set_password(&password)?;
        Ok::<_, cb_models::error::Error>(user)
    })
    .await
}

/// Creates a regular member and signs them in.
pub async fn register(state: &ApiState, payload: RegisterRequest) -> Result<AuthData> {
    let RegisterRequest {
        username,
        email,
        password,
        confirm_password,
        display_name,
    } = payload;

    let username = username.trim().to_string();
    let email = normalize_email(&email);
    let display_name = display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    validate_username(&username)?;
    validate_email(&email)?;
    validate_password(&password)?;
    validate_confirmation(&password, &confirm_password)?;
    validate_length("Display name", display_name.as_deref(), DISPLAY_NAME_MAX)?;

    let new_user = blocking(move || NewUser::new(username, email, &password, display_name)).await?;
    let user = state.store.create_user(new_user)?;
    let tokens = issue_auth_tokens(&state.codec, &user.identity())?;

    info!("Registered user {} ({})", user.id, user.username);
    Ok(AuthData { user, tokens })
}

/// Checks a password against the account found by email or username.
///
/// Unknown accounts and wrong passwords are indistinguishable. A deactivated
/// account is only reported once the password has matched.
pub async fn login(state: &ApiState, payload: LoginRequest) -> Result<AuthData> {
    let LoginRequest {
        email,
        username,
        password,
    } = payload;

    let email = email.map(|email| normalize_email(&email)).filter(|e| !e.is_empty());
    let username = username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let user = match (email, username) {
        (Some(email), _) => state.store.find_credential_by_email(&email)?,
        (None, Some(username)) => state.store.find_credential_by_username(&username)?,
        (None, None) => {
            return Err(Error::Validation(String::from(
                "Email or username is required",
            )));
        }
    };

    let Some(user) = user else {
        debug!("Login attempt for unknown account");
        tokio::task::spawn_blocking(move || {
            UNKNOWN_ACCOUNT
                .as_ref()
                .map(|credential| credential.verify(&password))
        })
        .await?;
        return Err(Error::InvalidCredentials);
    };

    if !password_matches(user.credential.clone(), password).await? {
        warn!("Failed login for user {}", user.profile.id);
        return Err(Error::InvalidCredentials);
    }
    if !user.profile.is_active {
        warn!("Login refused for deactivated user {}", user.profile.id);
        return Err(Error::AccountDeactivated);
    }

    state.store.update_last_login(&user.profile.id)?;
    let user = state
        .store
        .find_profile_by_id(&user.profile.id)?
        .unwrap_or(user.profile);
    let tokens = issue_auth_tokens(&state.codec, &user.identity())?;

    info!("User {} logged in", user.id);
    Ok(AuthData { user, tokens })
}

/// Hands the refresh token of the session, if any, to the revocation list.
///
/// Never fails: a missing or invalid token still logs the caller out.
pub fn logout(state: &ApiState, refresh_token: Option<&str>) {
    let Some(token) = refresh_token else {
        return;
    };
    match state.codec.verify(token, TokenType::Refresh) {
        Ok(claims) => {
            debug!("Logging out session {}", claims.jti);
            state.codec.denylist().revoke(&claims);
        }
        Err(err) => debug!("Ignoring unusable refresh token on logout: {err}"),
    }
}

/// Exchanges a refresh token for a new access token.
///
/// The new token carries the role currently stored for the user, and only
/// existing, active users get one.
pub async fn refresh(state: &ApiState, refresh_token: Option<&str>) -> Result<AccessBody> {
    let claims = verify_refresh_token(&state.codec, refresh_token)?;
    let user_id = claims.sub.ok_or(Error::InvalidRefreshToken)?;

    let user = state
        .store
        .find_profile_by_id(&user_id)?
        .filter(|user| user.is_active)
        .ok_or_else(|| {
            debug!("Refresh token for missing or inactive user {user_id}");
            Error::InvalidRefreshToken
        })?;

    Ok(issue_access_token(&state.codec, &user.identity())?)
}

pub async fn current_user(state: &ApiState, ctx: &Ctx) -> Result<UserProfile> {
    state
        .store
        .find_profile_by_id(&ctx.user_id())?
        .ok_or(Error::UserNotFound)
}

/// Updates display name and bio. The credential is never touched here.
pub async fn update_current_user(
    state: &ApiState,
    ctx: &Ctx,
    update: ProfileUpdate,
) -> Result<UserProfile> {
    let update = ProfileUpdate {
        display_name: update.display_name.map(|name| name.trim().to_string()),
        bio: update.bio.map(|bio| bio.trim().to_string()),
    };
    validate_length("Display name", update.display_name.as_deref(), DISPLAY_NAME_MAX)?;
    validate_length("Bio", update.bio.as_deref(), BIO_MAX)?;

    if update.is_empty() {
        return current_user(state, ctx).await;
    }
    state
        .store
        .update_profile(&ctx.user_id(), &update)?
        .ok_or(Error::UserNotFound)
}

pub async fn change_password(
    state: &ApiState,
    ctx: &Ctx,
    payload: ChangePasswordRequest,
) -> Result<()> {
    validate_password(&payload.new_password)?;
    validate_confirmation(&payload.new_password, &payload.confirm_password)?;

    let user = state
        .store
        .find_credential_by_id(&ctx.user_id())?
        .ok_or(Error::UserNotFound)?;

    if !password_matches(user.credential.clone(), payload.current_password).await? {
        warn!("Wrong current password for user {}", user.profile.id);
        return Err(Error::IncorrectPassword);
    }

    let user = rehash(user, payload.new_password).await?;
    state.store.update_credential(&user)?;

    info!("User {} changed their password", user.profile.id);
    Ok(())
}

/// Starts a password reset.
///
/// Answers identically whether or not the address belongs to an account;
/// only active accounts get a token, and lookup failures are logged instead
/// of returned.
pub async fn forgot_password(state: &ApiState, payload: ForgotPasswordRequest) -> Result<()> {
    let email = normalize_email(&payload.email);
    validate_email(&email)?;

    let user = match state.store.find_credential_by_email(&email) {
        Ok(user) => user,
        Err(err) => {
            error!("Password reset lookup failed: {err}");
            return Ok(());
        }
    };

    match user {
        Some(user) if user.profile.is_active => {
            match issue_reset_token(&state.codec, &user.profile.email) {
                Ok(token) => state.reset_sink.deliver(&user.profile, &token),
                Err(err) => error!("Failed to issue reset token: {err}"),
            }
        }
        Some(user) => debug!("Password reset requested for deactivated user {}", user.profile.id),
        None => debug!("Password reset requested for unknown email"),
    }
    Ok(())
}

/// Sets a new password with a reset token and revokes that token.
pub async fn reset_password(state: &ApiState, payload: ResetPasswordRequest) -> Result<()> {
    validate_password(&payload.password)?;
    validate_confirmation(&payload.password, &payload.confirm_password)?;

    let claims = verify_reset_token(&state.codec, &payload.token)?;
    let user = state
        .store
        .find_credential_by_email(&claims.email)?
        .filter(|user| user.profile.is_active)
        .ok_or(Error::InvalidResetToken)?;

    let user = rehash(user, payload.password).await?;
    state.store.update_credential(&user)?;
    state.codec.denylist().revoke(&claims);

    info!("Password reset for user {}", user.profile.id);
    Ok(())
}

/// Looks up any user by id.
pub async fn find_user(state: &ApiState, id: &Uuid) -> Result<UserProfile> {
    state.store.find_profile_by_id(id)?.ok_or(Error::UserNotFound)
}

/// Activates or deactivates an account. Admins cannot deactivate themselves.
pub async fn set_user_active(
    state: &ApiState,
    ctx: &Ctx,
    id: &Uuid,
    active: bool,
) -> Result<UserProfile> {
    if *id == ctx.user_id() && !active {
        return Err(Error::Validation(String::from(
            "You cannot deactivate your own account",
        )));
    }

    let user = state
        .store
        .set_active(id, active)?
        .ok_or(Error::UserNotFound)?;

    info!(
        "User {} {} by {}",
        user.id,
        if active { "activated" } else { "deactivated" },
        ctx.user_id()
    );
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use cb_auth::{
        config::TokenConfig,
        jwt::TokenCodec,
        role::Role,
        secret_hash::HASH_ALGORITHM_MARKER,
    };
    use cb_models::user::{memory::MemoryUserStore, store::UserStore};

    use super::*;
    use crate::reset::ResetTokenSink;

    #[derive(Default)]
    struct CapturingSink {
        tokens: Mutex<Vec<(Uuid, String)>>,
    }

    impl ResetTokenSink for CapturingSink {
        fn deliver(&self, user: &UserProfile, token: &str) {
            self.tokens.lock().unwrap().push((user.id, token.to_string()));
        }
    }

    struct Fixture {
        state: ApiState,
        store: Arc<MemoryUserStore>,
        sink: Arc<CapturingSink>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryUserStore::new());
        let sink = Arc::new(CapturingSink::default());
        let codec = TokenCodec::new(TokenConfig::with_secret("account-test-secret")).unwrap();
        let state = ApiState::new(codec, store.clone()).with_reset_sink(sink.clone());
        Fixture { state, store, sink }
    }

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: String::from("Password123!"),
            confirm_password: String::from("Password123!"),
            display_name: None,
        }
    }

    fn login_by_email(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            username: None,
            password: password.to_string(),
        }
    }

    fn ctx_for(user: &UserProfile) -> Ctx {
        Ctx::new(user.identity())
    }

    #[tokio::test]
    async fn register_then_login() {
        let f = fixture();
        let registered = register(&f.state, registration("ada", "Ada@Example.com"))
            .await
            .unwrap();

        assert_eq!(registered.user.email, "ada@example.com");
        assert_eq!(registered.user.role, Role::User);

        let stored = f
            .store
            .find_credential_by_email("ada@example.com")
            .unwrap()
            .unwrap();
        assert!(stored.credential.as_hash().starts_with(HASH_ALGORITHM_MARKER));
        assert_ne!(stored.credential.as_hash(), "Password123!");

        let logged_in = login(&f.state, login_by_email("ada@example.com", "Password123!"))
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
        assert!(logged_in.user.last_login.is_some());

        let wrong_case = login(&f.state, login_by_email("ada@example.com", "password123!")).await;
        assert!(matches!(wrong_case, Err(Error::InvalidCredentials)));
    }

    #[tokio::test]
    async fn login_by_username() {
        let f = fixture();
        register(&f.state, registration("grace", "grace@example.com"))
            .await
            .unwrap();

        let request = LoginRequest {
            email: None,
            username: Some(String::from("grace")),
            password: String::from("Password123!"),
        };
        assert!(login(&f.state, request).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_account_and_wrong_password_look_alike() {
        let f = fixture();
        register(&f.state, registration("alan", "alan@example.com"))
            .await
            .unwrap();

        let unknown = login(&f.state, login_by_email("nobody@example.com", "Password123!"))
            .await
            .unwrap_err();
        let wrong = login(&f.state, login_by_email("alan@example.com", "Wrong1234"))
            .await
            .unwrap_err();
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.message(), wrong.message());
    }

    #[test]
    fn unknown_accounts_are_checked_against_a_real_hash() {
        let credential = UNKNOWN_ACCOUNT.as_ref().unwrap();
        assert!(credential.as_hash().starts_with(HASH_ALGORITHM_MARKER));
        assert!(!credential.verify("Password123!"));
    }

    #[tokio::test]
    async fn registration_conflicts_and_validation() {
        let f = fixture();
        register(&f.state, registration("linus", "linus@example.com"))
            .await
            .unwrap();

        let same_name = register(&f.state, registration("linus", "other@example.com")).await;
        assert!(matches!(same_name, Err(Error::UsernameExists)));

        let same_email = register(&f.state, registration("torvalds", "LINUS@example.com")).await;
        assert!(matches!(same_email, Err(Error::EmailExists)));

        let mut mismatch = registration("ken", "ken@example.com");
        mismatch.confirm_password = String::from("Password1234");
        assert!(matches!(
            register(&f.state, mismatch).await,
            Err(Error::Validation(_))
        ));

        let mut weak = registration("dennis", "dennis@example.com");
        weak.password = String::from("password");
        weak.confirm_password = String::from("password");
        assert!(matches!(
            register(&f.state, weak).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(f.store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn deactivated_account_is_reported_only_after_password_matches() {
        let f = fixture();
        let user = register(&f.state, registration("barbara", "barbara@example.com"))
            .await
            .unwrap()
            .user;
        f.store.set_active(&user.id, false).unwrap();

        let wrong = login(&f.state, login_by_email("barbara@example.com", "Wrong1234")).await;
        assert!(matches!(wrong, Err(Error::InvalidCredentials)));

        let right = login(&f.state, login_by_email("barbara@example.com", "Password123!")).await;
        assert!(matches!(right, Err(Error::AccountDeactivated)));
    }

    #[tokio::test]
    async fn refresh_requires_an_active_user() {
        let f = fixture();
        let auth = register(&f.state, registration("edsger", "edsger@example.com"))
            .await
            .unwrap();

        let access = refresh(&f.state, Some(&auth.tokens.refresh_token))
            .await
            .unwrap();
        let claims = f.state.codec.verify(&access.access_token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, Some(auth.user.id));

        f.store.set_active(&auth.user.id, false).unwrap();
        let refused = refresh(&f.state, Some(&auth.tokens.refresh_token)).await;
        assert!(matches!(refused, Err(Error::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let f = fixture();
        let auth = register(&f.state, registration("donald", "donald@example.com"))
            .await
            .unwrap();

        let refused = refresh(&f.state, Some(&auth.tokens.access_token)).await;
        assert!(matches!(refused, Err(Error::InvalidRefreshToken)));
        assert!(matches!(
            refresh(&f.state, None).await,
            Err(Error::NoRefreshToken)
        ));
    }

    #[tokio::test]
    async fn profile_update_keeps_credential() {
        let f = fixture();
        let user = register(&f.state, registration("margaret", "margaret@example.com"))
            .await
            .unwrap()
            .user;
        let before = f.store.find_credential_by_id(&user.id).unwrap().unwrap();

        let update = ProfileUpdate {
            display_name: Some(String::from("Margaret H.")),
            bio: Some(String::from("Apollo guidance")),
        };
        let updated = update_current_user(&f.state, &ctx_for(&user), update)
            .await
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Margaret H."));

        let after = f.store.find_credential_by_id(&user.id).unwrap().unwrap();
        assert_eq!(before.credential, after.credential);
    }

    #[tokio::test]
    async fn change_password_checks_current_password() {
        let f = fixture();
        let user = register(&f.state, registration("john", "john@example.com"))
            .await
            .unwrap()
            .user;
        let ctx = ctx_for(&user);

        let wrong = ChangePasswordRequest {
            current_password: String::from("NotMine123"),
            new_password: String::from("NewPassword1"),
            confirm_password: String::from("NewPassword1"),
        };
        assert!(matches!(
            change_password(&f.state, &ctx, wrong).await,
            Err(Error::IncorrectPassword)
        ));

        let right = ChangePasswordRequest {
            current_password: String::from("Password123!"),
            new_password: String::from("NewPassword1"),
            confirm_password: String::from("NewPassword1"),
        };
        change_password(&f.state, &ctx, right).await.unwrap();

        assert!(login(&f.state, login_by_email("john@example.com", "Password123!")).await.is_err());
        assert!(login(&f.state, login_by_email("john@example.com", "NewPassword1")).await.is_ok());
    }

    #[tokio::test]
    async fn forgot_password_only_delivers_for_known_active_accounts() {
        let f = fixture();
        let user = register(&f.state, registration("hedy", "hedy@example.com"))
            .await
            .unwrap()
            .user;

        let request = |email: &str| ForgotPasswordRequest {
            email: email.to_string(),
        };
        forgot_password(&f.state, request("missing@example.com")).await.unwrap();
        assert!(f.sink.tokens.lock().unwrap().is_empty());

        forgot_password(&f.state, request("HEDY@example.com")).await.unwrap();
        let delivered = f.sink.tokens.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, user.id);

        f.store.set_active(&user.id, false).unwrap();
        forgot_password(&f.state, request("hedy@example.com")).await.unwrap();
        assert_eq!(f.sink.tokens.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reset_password_with_delivered_token() {
        let f = fixture();
        register(&f.state, registration("frances", "frances@example.com"))
            .await
            .unwrap();
        forgot_password(
            &f.state,
            ForgotPasswordRequest {
                email: String::from("frances@example.com"),
            },
        )
        .await
        .unwrap();
        let token = f.sink.tokens.lock().unwrap()[0].1.clone();

        reset_password(
            &f.state,
            ResetPasswordRequest {
                token,
                password: String::from("Recovered42"),
                confirm_password: String::from("Recovered42"),
            },
        )
        .await
        .unwrap();

        assert!(login(&f.state, login_by_email("frances@example.com", "Recovered42")).await.is_ok());

        let bogus = reset_password(
            &f.state,
            ResetPasswordRequest {
                token: String::from("not.a.token"),
                password: String::from("Recovered43"),
                confirm_password: String::from("Recovered43"),
            },
        )
        .await;
        assert!(matches!(bogus, Err(Error::InvalidResetToken)));
    }

    #[tokio::test]
    async fn admins_cannot_deactivate_themselves() {
        let f = fixture();
        let admin = f
            .store
            .create_user(
                NewUser::new("root", "root@example.com", "Password123!", None)
                    .unwrap()
                    .with_role(Role::Admin),
            )
            .unwrap();
        let member = register(&f.state, registration("member", "member@example.com"))
            .await
            .unwrap()
            .user;
        let ctx = ctx_for(&admin);

        assert!(matches!(
            set_user_active(&f.state, &ctx, &admin.id, false).await,
            Err(Error::Validation(_))
        ));
        let member = set_user_active(&f.state, &ctx, &member.id, false)
            .await
            .unwrap();
        assert!(!member.is_active);
        assert!(matches!(
            set_user_active(&f.state, &ctx, &Uuid::new_v4(), true).await,
            Err(Error::UserNotFound)
        ));
    }
}
