//! Outbound notifications for verification and password-reset links.
//!
//! Delivery itself lives outside this crate. The service hands a rendered
//! [`EmailMessage`] to a [`Notifier`]; `LogNotifier` is the default and only
//! logs, `MemoryNotifier` keeps messages around so callers can read the links.

use anyhow::Result;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::info;

pub const VERIFY_EMAIL_TEMPLATE: &str = "verify_email";
pub const RESET_PASSWORD_TEMPLATE: &str = "reset_password";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub token: String,
    pub payload_json: String,
}

impl EmailMessage {
    #[must_use]
    pub fn verify_email(to_email: &str, frontend_base_url: &str, token: &str) -> Self {
        let url = build_verify_url(frontend_base_url, token);
        Self {
            to_email: to_email.to_string(),
            template: VERIFY_EMAIL_TEMPLATE.to_string(),
            token: token.to_string(),
            payload_json: json!({ "verify_url": url }).to_string(),
        }
    }

    #[must_use]
    pub fn reset_password(to_email: &str, frontend_base_url: &str, token: &str) -> Self {
        let url = build_reset_url(frontend_base_url, token);
        Self {
            to_email: to_email.to_string(),
            template: RESET_PASSWORD_TEMPLATE.to_string(),
            token: token.to_string(),
            payload_json: json!({ "reset_url": url }).to_string(),
        }
    }
}

/// Build the frontend verification link included in outbound emails.
#[must_use]
pub fn build_verify_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/verify-email?token={token}")
}

#[must_use]
pub fn build_reset_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/forgot-password?token={token}")
}

pub trait Notifier: Send + Sync {
    /// Deliver a message or return an error.
    ///
    /// # Errors
    /// Returns an error if the message could not be handed off.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs the message instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

/// Keeps every message in memory; used by local runs and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryNotifier {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Most recent message for `to_email` with the given template.
    #[must_use]
    pub fn last(&self, to_email: &str, template: &str) -> Option<EmailMessage> {
        self.sent()
            .into_iter()
            .rev()
            .find(|message| message.to_email == to_email && message.template == template)
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}
