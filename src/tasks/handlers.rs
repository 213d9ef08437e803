use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::types::{
    ForgotPasswordEmailPayload, TaskEnvelope, TaskError, TaskKind, VerificationEmailPayload,
};
use crate::mail::{forgot_password_email, EmailSender, MailError};

/// Trait for components that run one kind of job
///
/// Handlers receive the raw JSON payload and are responsible for decoding it.
/// A payload that does not decode is a non-retryable failure.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), TaskError>;

    /// Get a human-readable name for this handler (for logging/debugging)
    fn name(&self) -> &'static str;
}

fn decode_payload<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<T, TaskError> {
    T::deserialize(payload)
        .map_err(|e| TaskError::non_retryable(format!("payload decode failed: {e}")))
}

fn mail_failure(error: MailError) -> TaskError {
    match error {
        MailError::InvalidMessage(msg) => TaskError::non_retryable(msg),
        MailError::Transport(msg) => TaskError::retryable(msg),
    }
}

/// Sends the account verification email
pub struct VerificationEmailHandler {
    sender: Arc<dyn EmailSender>,
}

impl VerificationEmailHandler {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl TaskHandler for VerificationEmailHandler {
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), TaskError> {
        let payload: VerificationEmailPayload = decode_payload(payload)?;

        self.sender
            .send_verification_email(
                &payload.to_email,
                &payload.verification_link,
                &payload.username,
            )
            .await
            .map_err(mail_failure)?;

        info!(to_email = %payload.to_email, "Sent verification email");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "VerificationEmailHandler"
    }
}

/// Sends a freshly generated password
pub struct ForgotPasswordEmailHandler {
    sender: Arc<dyn EmailSender>,
}

impl ForgotPasswordEmailHandler {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl TaskHandler for ForgotPasswordEmailHandler {
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), TaskError> {
        let payload: ForgotPasswordEmailPayload = decode_payload(payload)?;

        let message =
            forgot_password_email(&payload.to_email, &payload.new_password, &payload.username);
        self.sender.send_email(message).await.map_err(mail_failure)?;

        info!(to_email = %payload.to_email, "Sent forgot password email");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ForgotPasswordEmailHandler"
    }
}

/// Routes each job to the handler registered for its kind
#[derive(Default, Clone)]
pub struct TaskMux {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl TaskMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mux with both email handlers wired to the given sender
    pub fn with_email_handlers(sender: Arc<dyn EmailSender>) -> Self {
        let mut mux = Self::new();
        mux.register(
            TaskKind::VerificationEmail,
            Arc::new(VerificationEmailHandler::new(sender.clone())),
        );
        mux.register(
            TaskKind::ForgotPasswordEmail,
            Arc::new(ForgotPasswordEmailHandler::new(sender)),
        );
        mux
    }

    pub fn register(&mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) {
        info!(%kind, handler_name = handler.name(), "Registering task handler");
        self.handlers.insert(kind, handler);
    }

    /// Decodes the job kind and runs the matching handler once
    #[instrument(skip(self, envelope), fields(job_id = %envelope.id, kind = %envelope.kind, attempt = envelope.attempt))]
    pub async fn dispatch(&self, envelope: &TaskEnvelope) -> Result<(), TaskError> {
        let kind = TaskKind::from_str(&envelope.kind).map_err(|_| {
            warn!("Unknown task kind");
            TaskError::non_retryable(format!("unknown task kind: {}", envelope.kind))
        })?;

        let handler = self.handlers.get(&kind).ok_or_else(|| {
            warn!("No handler registered for task kind");
            TaskError::non_retryable(format!("no handler registered for {kind}"))
        })?;

        debug!(handler = handler.name(), "Dispatching task");
        handler.handle(&envelope.payload).await
    }
}
