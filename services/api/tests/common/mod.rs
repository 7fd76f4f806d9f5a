//! Shared harness for the HTTP integration tests: the real router on top of the
//! in-memory store, in-memory file storage and a mailer that keeps what it sends.

#![allow(dead_code)]

use api_lib::{
    adapters::{MemoryDatabase, MemoryFileStorage},
    config::Config,
    services::profiles::NewAccount,
    web::{build_router, csrf::CsrfTokenStore, AppState},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use client_portal_core::domain::Profile;
use client_portal_core::ports::{EmailMessage, EmailService, PortError, PortResult};
use client_portal_core::{Role, User, UserType};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const PASSWORD: &str = "Secret#2024";

/// Keeps every message instead of delivering it. Can be told to fail.
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<bool>,
}

impl CapturingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_to(&self, to: &str) -> Option<EmailMessage> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }

    pub fn fail_from_now_on(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl EmailService for CapturingMailer {
    async fn send(&self, message: EmailMessage) -> PortResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(PortError::Unexpected("relay unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "memory://".to_string(),
        log_level: tracing::Level::INFO,
        jwt_secret: "integration-test-secret".to_string(),
        jwt_ttl_hours: 1,
        upload_dir: std::env::temp_dir().join("client-portal-tests"),
        frontend_url: "http://localhost:3000".to_string(),
        otp_ttl_minutes: 10,
        reset_token_ttl_minutes: 10,
        max_failed_attempts: 5,
        lockout_minutes: 30,
        login_lockout_enabled: false,
        rate_limit_max: 10_000,
        rate_limit_window_secs: 900,
        auth_rate_limit_max: 10_000,
        trust_proxy: false,
        mail_relay_url: None,
        mail_from: "portal@test.local".to_string(),
        csrf_token_ttl_secs: 3600,
    }
}

/// A decoded response.
pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDatabase>,
    pub storage: Arc<MemoryFileStorage>,
    pub mailer: Arc<CapturingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let storage = Arc::new(MemoryFileStorage::new());
        let mailer = Arc::new(CapturingMailer::default());
        let state = Arc::new(AppState::new(
            Arc::new(config),
            db.clone(),
            storage.clone(),
            mailer.clone(),
        ));
        let router = build_router(state.clone()).unwrap();
        Self {
            router,
            state,
            db,
            storage,
            mailer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        send_to(&self.router, request).await
    }

    /// A JSON request. Mutating requests carry a fresh anti-forgery token.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if method != Method::GET {
            builder = builder.header("x-csrf-token", self.state.csrf.issue());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> Reply {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        form: Multipart,
    ) -> Reply {
        let (content_type, body) = form.finish();
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header("x-csrf-token", self.state.csrf.issue())
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Creates an account directly through the profile service.
    pub async fn seed_user(&self, pan: &str, role: Role) -> User {
        seed_account(&self.state, pan, role).await
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state.identity.tokens().issue(user, Utc::now()).unwrap()
    }

    /// Seeds a user and returns it with a bearer token.
    pub async fn user_with_token(&self, pan: &str, role: Role) -> (User, String) {
        let user = self.seed_user(pan, role).await;
        let token = self.token_for(&user);
        (user, token)
    }
}

pub async fn send_to(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        headers,
        bytes,
    }
}

/// An individual account with the shared test password.
pub async fn seed_account(state: &AppState, pan: &str, role: Role) -> User {
    let digits: String = pan.chars().filter(|c| c.is_ascii_digit()).collect();
    state
        .profiles
        .create_account(
            NewAccount {
                user_type: UserType::Individual,
                email: format!("{}@example.com", pan.to_lowercase()),
                mobile: format!("98765{digits:0>5}"),
                pan: pan.to_string(),
                password: PASSWORD.to_string(),
                role,
                profile: Profile {
                    first_name: Some("Test".to_string()),
                    last_name: Some(pan.to_string()),
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
                    ..Profile::default()
                },
            },
            Utc::now().date_naive(),
        )
        .await
        .unwrap()
}

/// A hand-built `multipart/form-data` body.
pub struct Multipart {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self {
            boundary: "portal-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, mime: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, mime
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
