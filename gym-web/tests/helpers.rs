//! Integration test helpers
//!
//! `TestRouter` drives the router in-process with `oneshot`; `spawn_app`
//! serves it on a free port for tests that go through a real socket.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use gym_access::TokenKind;
use gym_web::{create_app, AppState};
use serde_json::Value;
use std::sync::LazyLock;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const ADMIN: &str = "admin@example.com";

// Keep tracing initialised once per test binary
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

/// Router plus the state behind it
pub struct TestRouter {
    pub state: AppState,
    pub app: Router,
}

/// Request credentials
#[derive(Default, Clone)]
pub struct Creds {
    pub bearer: Option<String>,
    pub api_key: Option<String>,
    pub authorization: Option<String>,
}

impl Creds {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bearer(token: &str) -> Self {
        Self {
            bearer: Some(token.to_string()),
            ..Self::default()
        }
    }

    pub fn api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    pub fn both(token: &str, key: &str) -> Self {
        Self {
            bearer: Some(token.to_string()),
            api_key: Some(key.to_string()),
            ..Self::default()
        }
    }
}

impl TestRouter {
    pub async fn new() -> Self {
        LazyLock::force(&TRACING);
        let state = AppState::for_testing().await.unwrap();
        let app = create_app(state.clone());
        Self { state, app }
    }

    /// Send a request and decode the JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        creds: &Creds,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = &creds.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(raw) = &creds.authorization {
            builder = builder.header("Authorization", raw.as_str());
        }
        if let Some(key) = &creds.api_key {
            builder = builder.header("X-API-Key", key.as_str());
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, creds: &Creds) -> (StatusCode, Value) {
        self.send(Method::GET, uri, creds, None).await
    }

    pub async fn post(&self, uri: &str, creds: &Creds, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, creds, Some(body)).await
    }

    pub async fn put(&self, uri: &str, creds: &Creds, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, creds, body).await
    }

    pub async fn delete(&self, uri: &str, creds: &Creds, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, creds, body).await
    }

    /// Bootstrap the admin and return a bearer token for it
    pub async fn admin(&self) -> Creds {
        self.state.bootstrap_admin(ADMIN).await.unwrap();
        Creds::bearer(&self.token_for(ADMIN))
    }

    /// Token for `subject` carrying no role claims
    pub fn token_for(&self, subject: &str) -> String {
        self.state
            .tokens
            .issue(subject, Vec::new(), TokenKind::User)
            .unwrap()
            .token
    }

    /// Register and log in a user, returning its bearer token
    pub async fn login(&self, email: &str, password: &str) -> String {
        let credentials = serde_json::json!({ "email": email, "password": password });

        let (status, _) = self
            .post("/register", &Creds::none(), credentials.clone())
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self.post("/login", &Creds::none(), credentials).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

/// Served application
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub state: AppState,
    pub api_client: reqwest::Client,
}

/// Serve a fresh application on a free local port
pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    let state = AppState::for_testing().await.unwrap();
    let app = create_app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        state,
        api_client: client,
    }
}
