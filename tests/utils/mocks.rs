use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use rental::mail::{EmailMessage, EmailSender, MailError};
use rental::tasks::{JobId, QueueError, Task, TaskEnvelope, TaskQueue};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Arguments of one `send_verification_email` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCall {
    pub to_email: String,
    pub verification_link: String,
    pub username: String,
}

/// Email sender that keeps everything it is asked to deliver.
///
/// The first `failures` deliveries fail with a transport error.
#[derive(Default)]
pub struct RecordingEmailSender {
    failures: u32,
    attempts: AtomicU32,
    verification_calls: Mutex<Vec<VerificationCall>>,
    messages: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn verification_calls(&self) -> Vec<VerificationCall> {
        self.verification_calls.lock().await.clone()
    }

    pub async fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().await.clone()
    }

    fn try_deliver(&self) -> Result<(), MailError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(MailError::Transport("relay unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError> {
        self.try_deliver()?;
        self.messages.lock().await.push(message);
        Ok(())
    }

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_link: &str,
        username: &str,
    ) -> Result<(), MailError> {
        self.try_deliver()?;
        self.verification_calls.lock().await.push(VerificationCall {
            to_email: to_email.to_string(),
            verification_link: verification_link.to_string(),
            username: username.to_string(),
        });
        Ok(())
    }
}

/// Queue whose backend is always down
pub struct UnreachableTaskQueue;

#[async_trait]
impl TaskQueue for UnreachableTaskQueue {
    async fn enqueue(&self, _task: &Task) -> Result<JobId, QueueError> {
        Err(QueueError::Backend("connection refused".to_string()))
    }

    async fn dequeue(&self) -> Result<Option<TaskEnvelope>, QueueError> {
        Err(QueueError::Backend("connection refused".to_string()))
    }

    async fn requeue(&self, _envelope: TaskEnvelope) -> Result<(), QueueError> {
        Err(QueueError::Backend("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}
