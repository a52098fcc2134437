//! SMTP delivery of listing digests.

use crate::error::{NotifyError, Result};
use crate::templates::{render_digest, EmailDigest};
use crate::Notifier;
use adscout_core::config::NotificationConfig;
use adscout_db::ListingRecord;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Sends listing digests via an authenticated SMTP relay.
#[derive(Debug)]
pub struct EmailNotifier {
    sender: Mailbox,
    recipients: Vec<Mailbox>,
    transport: SmtpTransport,
}

impl EmailNotifier {
    /// Build a notifier from the notification config.
    ///
    /// # Errors
    /// Returns an error if the config is incomplete or an address does
    /// not parse.
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            return Err(NotifyError::IncompleteConfig(
                "smtp_host is not set".to_string(),
            ));
        }
        if config.recipients.is_empty() {
            return Err(NotifyError::IncompleteConfig(
                "no recipients configured".to_string(),
            ));
        }

        let sender = parse_mailbox(&config.sender)?;
        let recipients = config
            .recipients
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>>>()?;

        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
        let transport = SmtpTransport::relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self {
            sender,
            recipients,
            transport,
        })
    }

    fn build_message(&self, digest: &EmailDigest) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(&digest.subject)
            .header(ContentType::TEXT_HTML);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        Ok(builder.body(digest.html_body.clone())?)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify_new_listings(&self, listings: &[ListingRecord]) -> Result<()> {
        if listings.is_empty() {
            return Ok(());
        }

        let digest = render_digest(listings);
        let message = self.build_message(&digest)?;

        // lettre's SMTP transport is blocking; keep it off the runtime.
        let transport = self.transport.clone();
        let send_result = tokio::task::spawn_blocking(move || transport.send(&message)).await;

        match send_result {
            Ok(Ok(_)) => {
                tracing::info!(count = listings.len(), "Notification email sent");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(join_err) => Err(NotifyError::IncompleteConfig(format!(
                "send task failed: {join_err}"
            ))),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: format!("{e}"),
        })
}
