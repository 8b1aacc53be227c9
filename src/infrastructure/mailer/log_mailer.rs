use crate::domain::{MailTemplate, Mailer};
use anyhow::{ensure, Result};

pub struct LogMailer {
    // ---
    sender: String,
}

impl LogMailer {
    // ---
    pub fn new(sender: &str) -> Self {
        // ---
        LogMailer {
            sender: sender.to_string(),
        }
    }
}

/// Names of the template variables; values carry tokens and stay out of logs.
fn payload_keys(data: &serde_json::Value) -> Vec<&str> {
    // ---
    data.as_object()
        .map(|fields| fields.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl Mailer for LogMailer {
    // ---
    async fn send(
        &self,
        recipient: &str,
        template: MailTemplate,
        data: serde_json::Value,
    ) -> Result<()> {
        // ---
        ensure!(!recipient.is_empty(), "mail recipient must not be empty");

        tracing::info!(
            from = %self.sender,
            to = %recipient,
            template = template.name(),
            "Dispatching email"
        );
        tracing::debug!(fields = ?payload_keys(&data), "Email payload");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_accepts_a_recipient() {
        // ---
        let mailer = LogMailer::new("Book Club <no-reply@bookclub.local>");

        let result = mailer
            .send("sam@shire.example", MailTemplate::UserWelcome, json!({"userID": 1}))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn send_rejects_empty_recipient() {
        // ---
        let mailer = LogMailer::new("Book Club <no-reply@bookclub.local>");

        let result = mailer
            .send("", MailTemplate::PasswordReset, json!({}))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn payload_keys_omit_values() {
        // ---
        let data = json!({"activationToken": "s3cr3t-plaintext", "userID": 7});

        let keys = payload_keys(&data);

        assert_eq!(keys, ["activationToken", "userID"]);
        assert!(!format!("{keys:?}").contains("s3cr3t-plaintext"));
        assert!(payload_keys(&json!("not an object")).is_empty());
    }
}
