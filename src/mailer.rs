use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::AppConfig;

const VERIFICATION_SUBJECT: &str = "Verify your ReadIQ Account";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// OutgoingMail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    /// The message sent after registration.
    pub fn verification(config: &AppConfig, to: &str, token: &str) -> Self {
        let link = config.verification_link(token);
        Self {
            from: config.mail_from.clone(),
            to: to.to_string(),
            subject: VERIFICATION_SUBJECT.to_string(),
            body: format!(
                "Welcome to ReadIQ!\n\nPlease confirm your email address by opening the link below:\n\n{link}\n"
            ),
        }
    }
}

/// Mailer
///
/// Outbound mail contract. Delivery is best effort: callers go through `dispatch`,
/// which never lets a failure reach the request that triggered it.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

pub type MailerState = Arc<dyn Mailer>;

/// Sends `mail` on a background task; failures are logged and dropped.
pub fn dispatch(mailer: MailerState, mail: OutgoingMail) {
    tokio::spawn(async move {
        let to = mail.to.clone();
        match mailer.send(mail).await {
            Ok(()) => tracing::info!(%to, "verification mail sent"),
            Err(e) => tracing::warn!(%to, error = %e, "failed to send verification mail"),
        }
    });
}

/// Builds the mailer the configuration asks for: the HTTP relay when
/// `MAIL_API_URL` is set, the logging mailer otherwise.
pub fn from_config(config: &AppConfig) -> MailerState {
    match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailer::new(url.clone(), config.mail_api_key.clone())),
        None => {
            tracing::warn!("MAIL_API_URL not set; verification mail will only be logged");
            Arc::new(LogMailer)
        }
    }
}

// --- HTTP relay ---

/// HttpMailer
///
/// Posts `{from, to, subject, text}` as JSON to a transactional mail API,
/// authenticating with a bearer key when one is configured.
pub struct HttpMailer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let mut request = self.client.post(&self.url).json(&json!({
            "from": mail.from,
            "to": mail.to,
            "subject": mail.subject,
            "text": mail.body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailError::Rejected(format!("relay answered {}", response.status())));
        }
        Ok(())
    }
}

// --- Log only ---

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "mail (not delivered)");
        Ok(())
    }
}

// --- Mock ---

/// MockMailer
///
/// Records every message for assertions. `new_failing()` rejects every send
/// (after recording it), to check that registration survives mail failures.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    pub should_fail: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().await.push(mail);
        if self.should_fail {
            return Err(MailError::Rejected("simulated failure".to_string()));
        }
        Ok(())
    }
}
