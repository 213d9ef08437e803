// Outgoing email. The transport is pluggable behind `EmailSender`; the
// bundled `LogEmailSender` writes messages to the log instead of an SMTP relay.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::MailConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// An HTML email ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl EmailMessage {
    pub fn new(subject: impl Into<String>, html: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            html: html.into(),
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), MailError> {
        if self.to.is_empty() {
            return Err(MailError::InvalidMessage("no recipients".to_string()));
        }
        if let Some(bad) = self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .find(|addr| !addr.contains('@'))
        {
            return Err(MailError::InvalidMessage(format!(
                "malformed address: {bad}"
            )));
        }
        Ok(())
    }
}

/// Subject and body of the account verification email
pub fn verification_email(to_email: &str, verification_link: &str, username: &str) -> EmailMessage {
    let html = format!(
        "Hello, {username}. <br/>\n\
         Thank you for registering with us!<br/>\n\
         Click <a href='{verification_link}'>here</a> to verify your email address."
    );
    EmailMessage::new("Verify Your Email Address", html, vec![to_email.to_string()])
}

/// Subject and body of the generated-password email
pub fn forgot_password_email(to_email: &str, new_password: &str, username: &str) -> EmailMessage {
    let html = format!(
        "Hello {username}, your new password is: {new_password}. Please change the password"
    );
    EmailMessage::new("Your New Password", html, vec![to_email.to_string()])
}

/// Trait for delivering outgoing email
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError>;

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_link: &str,
        username: &str,
    ) -> Result<(), MailError> {
        self.send_email(verification_email(to_email, verification_link, username))
            .await
    }
}

/// Sender that records each message in the log
pub struct LogEmailSender {
    from: String,
}

impl LogEmailSender {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            from: format!("{} <{}>", config.from_name, config.from_address),
        }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError> {
        message.validate()?;
        info!(
            from = %self.from,
            to = ?message.to,
            cc = ?message.cc,
            bcc = ?message.bcc,
            body_len = message.html.len(),
            "Email delivered to log transport"
        );
        Ok(())
    }
}
