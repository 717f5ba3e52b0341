use async_trait::async_trait;
use sendgrid::v3::{Content, Email, Personalization, Sender};
use tracing::info;

use crate::errors::{AppError, Result};

/// Opaque "deliver this message to this address" seam. Failures surface as
/// `AppError::EmailDispatch` so callers can treat them as retryable.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

pub struct SendgridMailer {
    from: Email,
    sender: Sender,
}

impl SendgridMailer {
    pub fn new(api_key: String, from_address: String) -> Self {
        Self {
            from: Email::new(from_address),
            sender: Sender::new(api_key),
        }
    }
}

#[async_trait]
impl EmailSender for SendgridMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let personalization = Personalization::new(Email::new(to.to_owned()));

        let message = sendgrid::v3::Message::new(self.from.clone())
            .set_subject(subject)
            .add_content(
                Content::new()
                    .set_content_type("text/plain")
                    .set_value(body.to_owned()),
            )
            .add_personalization(personalization);

        self.sender
            .send(&message)
            .await
            .map_err(|e| AppError::email_dispatch(format!("SendGrid error: {}", e)))?;
        info!(subject = %subject, "Sent email via SendGrid");

        Ok(())
    }
}

/// Prints outgoing mail instead of delivering it. Used when no SendGrid
/// API key is configured.
pub struct ConsoleMailer {
    pub from: String,
}

#[async_trait]
impl EmailSender for ConsoleMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        println!("From: {}", self.from);
        println!("To: {}", to);
        println!("Subject: {}", subject);
        println!("{}", "-".repeat(80));
        println!("{}\n", body);

        Ok(())
    }
}
