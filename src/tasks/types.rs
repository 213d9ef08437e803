use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type JobId = Uuid;

/// Job kinds understood by the worker; the string form travels in the envelope
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
    strum_macros::EnumIter,
)]
pub enum TaskKind {
    #[strum(serialize = "email:verification")]
    VerificationEmail,
    #[strum(serialize = "email:forgot_password")]
    ForgotPasswordEmail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEmailPayload {
    pub to_email: String,
    pub verification_link: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgotPasswordEmailPayload {
    pub to_email: String,
    pub new_password: String,
    pub username: String,
}

/// A unit of deferred work, as built by the code that enqueues it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    VerificationEmail(VerificationEmailPayload),
    ForgotPasswordEmail(ForgotPasswordEmailPayload),
}

impl Task {
    pub fn verification_email(
        to_email: impl Into<String>,
        verification_link: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Task::VerificationEmail(VerificationEmailPayload {
            to_email: to_email.into(),
            verification_link: verification_link.into(),
            username: username.into(),
        })
    }

    pub fn forgot_password_email(
        to_email: impl Into<String>,
        new_password: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Task::ForgotPasswordEmail(ForgotPasswordEmailPayload {
            to_email: to_email.into(),
            new_password: new_password.into(),
            username: username.into(),
        })
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::VerificationEmail(_) => TaskKind::VerificationEmail,
            Task::ForgotPasswordEmail(_) => TaskKind::ForgotPasswordEmail,
        }
    }

    fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Task::VerificationEmail(payload) => serde_json::to_value(payload),
            Task::ForgotPasswordEmail(payload) => serde_json::to_value(payload),
        }
    }
}

/// What actually sits on the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: JobId,
    pub kind: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt: u32,
}

impl TaskEnvelope {
    pub fn new(task: &Task, enqueued_at: DateTime<Utc>) -> Result<Self, QueueError> {
        let payload = task
            .payload()
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            kind: task.kind().to_string(),
            payload,
            enqueued_at,
            attempt: 0,
        })
    }

    pub fn to_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, QueueError> {
        serde_json::from_str(raw).map_err(|e| QueueError::Serialization(e.to_string()))
    }
}

/// Errors raised by the queue client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("failed to serialize task: {0}")]
    Serialization(String),

    #[error("queue backend failure: {0}")]
    Backend(String),
}

/// Errors that can occur while running a job
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Retryable error: {0}")]
    Retryable(String),

    #[error("Non-retryable error: {0}")]
    NonRetryable(String),
}

impl TaskError {
    /// Whether the job should go back on the queue
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Retryable(_))
    }

    pub fn retryable(msg: impl Into<String>) -> Self {
        TaskError::Retryable(msg.into())
    }

    pub fn non_retryable(msg: impl Into<String>) -> Self {
        TaskError::NonRetryable(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_task_kind_strings() {
        assert_eq!(TaskKind::VerificationEmail.to_string(), "email:verification");
        assert_eq!(
            TaskKind::ForgotPasswordEmail.to_string(),
            "email:forgot_password"
        );
        for kind in TaskKind::iter() {
            assert_eq!(TaskKind::from_str(kind.as_ref()).unwrap(), kind);
        }
        assert!(TaskKind::from_str("email:unknown").is_err());
    }

    #[test]
    fn test_envelope_payload_is_flat_json() {
        let task = Task::verification_email(
            "a@x.com",
            "http://localhost:8000/api/user/verify/a@x.com/12345",
            "alice",
        );
        let envelope = TaskEnvelope::new(&task, Utc::now()).unwrap();

        assert_eq!(envelope.kind, "email:verification");
        assert_eq!(envelope.attempt, 0);
        assert_eq!(
            envelope.payload,
            serde_json::json!({
                "to_email": "a@x.com",
                "verification_link": "http://localhost:8000/api/user/verify/a@x.com/12345",
                "username": "alice"
            })
        );
    }

    #[test]
    fn test_envelope_without_attempt_defaults_to_zero() {
        let raw = r#"{
            "id": "6f1c1d5e-0a4b-4c55-8d1e-6c3c4c2f9a10",
            "kind": "email:forgot_password",
            "payload": {"to_email": "a@x.com", "new_password": "x", "username": "alice"},
            "enqueued_at": "2024-05-01T10:00:00Z"
        }"#;
        let envelope = TaskEnvelope::from_json(raw).unwrap();
        assert_eq!(envelope.attempt, 0);
        assert_eq!(envelope.kind, "email:forgot_password");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TaskError::retryable("smtp down").is_retryable());
        assert!(!TaskError::non_retryable("bad payload").is_retryable());
    }
}
