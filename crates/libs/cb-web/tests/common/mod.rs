#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use cb_auth::{config::TokenConfig, jwt::TokenCodec, role::Role};
use cb_models::user::{
    account::{NewUser, UserProfile},
    memory::MemoryUserStore,
    store::UserStore,
};
use cb_web::{
    api::router,
    reset::ResetTokenSink,
    state::{ApiState, RateLimits},
};
use reqwest::{Response, header};
use serde_json::{Value, json};

pub const PASSWORD: &str = "Password123!";

/// Keeps every reset token instead of mailing it.
#[derive(Default)]
pub struct CapturedResets {
    pub tokens: Mutex<Vec<String>>,
}

impl ResetTokenSink for CapturedResets {
    fn deliver(&self, _user: &UserProfile, token: &str) {
        self.tokens.lock().unwrap().push(token.to_string());
    }
}

/// The router served on an ephemeral port with an in-memory store.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryUserStore>,
    pub resets: Arc<CapturedResets>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_limits(RateLimits::default()).await
    }

    pub async fn start_with_limits(limits: RateLimits) -> Self {
        let store = Arc::new(MemoryUserStore::new());
        let resets = Arc::new(CapturedResets::default());
        let codec = TokenCodec::new(TokenConfig::with_secret("integration-test-secret")).unwrap();
        let state = ApiState::new(codec, store.clone())
            .with_reset_sink(resets.clone())
            .with_rate_limits(limits);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router(state).into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "content-type",
            header::HeaderValue::from_static("application/json"),
        );
        let client = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .expect("Failed to build reqwest Client");

        Self {
            addr,
            store,
            resets,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn v1(&self, path: &str) -> String {
        self.url(&format!("/v1/{path}"))
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.v1(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send http request")
    }

    pub async fn register(&self, username: &str, email: &str) -> Value {
        let response = self
            .post(
                "auth/register",
                json!({
                    "username": username,
                    "email": email,
                    "password": PASSWORD,
                    "confirm_password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post("auth/login", json!({ "email": email, "password": password }))
            .await
    }

    /// Creates a user with `role` directly in the store and logs them in.
    pub async fn access_token_for_role(&self, username: &str, role: Role) -> String {
        let email = format!("{username}@example.com");
        self.store
            .create_user(
                NewUser::new(username, email.as_str(), PASSWORD, None)
                    .unwrap()
                    .with_role(role),
            )
            .unwrap();

        let body: Value = self.login(&email, PASSWORD).await.json().await.unwrap();
        access_token(&body)
    }
}

pub fn access_token(body: &Value) -> String {
    body["data"]["tokens"]["access_token"]
        .as_str()
        .expect("response carries an access token")
        .to_string()
}

pub fn refresh_token(body: &Value) -> String {
    body["data"]["tokens"]["refresh_token"]
        .as_str()
        .expect("response carries a refresh token")
        .to_string()
}

pub async fn error_code(response: Response) -> String {
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    body["error"]["code"].as_str().unwrap().to_string()
}
