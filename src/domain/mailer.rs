use anyhow::Result;
use std::sync::Arc;

/// Messages the service knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTemplate {
    UserWelcome,
    PasswordReset,
}

impl MailTemplate {
    // ---
    pub fn name(&self) -> &'static str {
        // ---
        match self {
            MailTemplate::UserWelcome => "user_welcome.tmpl",
            MailTemplate::PasswordReset => "reset_password.tmpl",
        }
    }
}

/// Abstraction for outgoing mail delivery.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    // ---
    /// Render `template` with `data` and deliver it to `recipient`.
    async fn send(&self, recipient: &str, template: MailTemplate, data: serde_json::Value)
        -> Result<()>;
}

/// Type alias for any backend that implements Mailer.
pub type MailerPtr = Arc<dyn Mailer>;
