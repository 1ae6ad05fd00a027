//! Communication email delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send a
//! communication as a plain-text email. Configuration is loaded from
//! environment variables; if `SMTP_HOST` is not set, [`EmailConfig::from_env`]
//! returns `None` and communications are delivered in-app only.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use lagooz_db::models::communication::Communication;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@lagooz.local";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      |                         |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@lagooz.local`  |
    /// | `SMTP_USER`     | no       |                         |
    /// | `SMTP_PASSWORD` | no       |                         |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Outgoing message
// ---------------------------------------------------------------------------

/// Subject and body of the email sent for one communication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// Render a communication. Attachments are listed by name.
    pub fn compose(communication: &Communication, attachment_names: &[String]) -> Self {
        let mut body = communication.message.clone();
        if communication.requires_response {
            body.push_str("\n\nA response to this message is requested.");
        }
        if !attachment_names.is_empty() {
            body.push_str("\n\nAttachments:");
            for name in attachment_names {
                body.push_str("\n- ");
                body.push_str(name);
            }
        }
        Self {
            subject: format!("[Lagooz] {}", communication.title),
            body,
        }
    }
}

/// Per-address outcome of a batch send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmailTally {
    pub sent: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends communication emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(transport_builder.build())
    }

    fn build(&self, to_email: &str, email: &OutgoingEmail) -> Result<Message, EmailError> {
        Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    /// Send `email` to every address over one transport.
    ///
    /// Only a transport that cannot be set up fails the call. A single
    /// address that fails is logged and counted.
    pub async fn send_all(
        &self,
        addresses: &[String],
        email: &OutgoingEmail,
    ) -> Result<EmailTally, EmailError> {
        let mut tally = EmailTally::default();
        if addresses.is_empty() {
            return Ok(tally);
        }

        let mailer = self.mailer()?;
        for to_email in addresses {
            let result = match self.build(to_email, email) {
                Ok(message) => mailer.send(message).await.map(|_| ()).map_err(EmailError::from),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    tally.sent += 1;
                    tracing::info!(
                        to = %to_email,
                        subject = %email.subject,
                        "Communication email sent"
                    );
                }
                Err(e) => {
                    tally.failed += 1;
                    tracing::error!(
                        to = %to_email,
                        error = %e,
                        "Failed to send communication email"
                    );
                }
            }
        }
        Ok(tally)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn communication() -> Communication {
        let now = Utc::now();
        Communication {
            id: 1,
            sender_id: 2,
            title: "Sports day".into(),
            message: "Bring your kit.".into(),
            requires_response: false,
            is_draft: false,
            sent: false,
            scheduled_time: None,
            sent_at: None,
            selected_recipient_ids: vec![3],
            manual_emails: Vec::new(),
            saved_filter_data: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn from_env_returns_none_without_smtp_host() {
        std::env::remove_var("SMTP_HOST");
        assert!(EmailConfig::from_env().is_none());
    }

    #[test]
    fn compose_uses_title_as_subject() {
        let email = OutgoingEmail::compose(&communication(), &[]);
        assert_eq!(email.subject, "[Lagooz] Sports day");
        assert_eq!(email.body, "Bring your kit.");
    }

    #[test]
    fn compose_lists_attachments_and_response_request() {
        let comm = Communication {
            requires_response: true,
            ..communication()
        };
        let email = OutgoingEmail::compose(&comm, &["kit.pdf".to_string(), "map.png".to_string()]);
        assert!(email.body.contains("A response to this message is requested."));
        assert!(email.body.ends_with("Attachments:\n- kit.pdf\n- map.png"));
    }

    #[test]
    fn bad_recipient_address_fails_the_build() {
        let delivery = EmailDelivery::new(EmailConfig {
            smtp_host: "localhost".into(),
            smtp_port: DEFAULT_SMTP_PORT,
            from_address: DEFAULT_FROM_ADDRESS.into(),
            smtp_user: None,
            smtp_password: None,
        });
        let email = OutgoingEmail::compose(&communication(), &[]);
        let err = delivery.build("not-an-email", &email).unwrap_err();
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}
