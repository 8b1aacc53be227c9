mod log_mailer;

pub use log_mailer::LogMailer;
use std::sync::Arc;

/// Creates a mailer that records each send through `tracing`.
///
/// Delivery is left to whatever ships the logs; the API only needs the
/// send to be observable and non-blocking for the caller.
pub fn create(sender: &str) -> crate::domain::MailerPtr {
    // ---
    Arc::new(LogMailer::new(sender))
}
