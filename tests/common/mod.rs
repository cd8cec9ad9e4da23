#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use readiq_backend::{
    AppConfig, AppState, MailerState, MemoryRepository, MockReadingStore, RepositoryState,
    StorageState, TokenService, create_router,
    mailer::{MockMailer, OutgoingMail},
    models::{NewUser, Role, User},
    password,
    repository::Repository,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

/// A full router over in-memory collaborators, plus handles on each of them.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub mailer: Arc<MockMailer>,
    pub storage: Arc<MockReadingStore>,
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_parts(MockMailer::new(), MockReadingStore::new())
    }

    pub fn with_parts(mailer: MockMailer, storage: MockReadingStore) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let mailer = Arc::new(mailer);
        let storage = Arc::new(storage);
        let config = AppConfig::default();
        let tokens = TokenService::from_config(&config);

        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: storage.clone() as StorageState,
            mailer: mailer.clone() as MailerState,
            tokens: tokens.clone(),
            config: config.clone(),
        };

        Self {
            router: create_router(state),
            repo,
            mailer,
            storage,
            tokens,
            config,
        }
    }

    /// Inserts a verified, active account with password `PASSWORD`.
    pub async fn seed_user(&self, username: &str, role: Role, parent_id: Option<Uuid>) -> User {
        self.repo
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: password::hash_password(PASSWORD).unwrap(),
                role,
                verified: true,
                parent_id,
            })
            .await
            .unwrap()
    }

    pub fn token_for(&self, user: &User) -> String {
        self.tokens.issue(&user.email, user.role, user.id).unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Posts a single-field multipart form, as a browser would for `<input type=file>`.
    pub async fn upload(
        &self,
        token: &str,
        filename: &str,
        content_type: &str,
        content: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "readiq-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/protected/reading/upload")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    /// Mail is dispatched on a spawned task; give it a moment to land.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<OutgoingMail> {
        for _ in 0..100 {
            let sent = self.mailer.sent().await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.mailer.sent().await
    }
}

/// Pulls the token out of the link in a verification mail.
pub fn token_from_mail(mail: &OutgoingMail) -> String {
    mail.body
        .split("token=")
        .nth(1)
        .expect("verification link missing from mail body")
        .split_whitespace()
        .next()
        .unwrap()
        .to_string()
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}
