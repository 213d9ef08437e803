use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::types::{JobId, QueueError, Task, TaskEnvelope};

/// Trait for the task queue client
#[async_trait]
pub trait TaskQueue {
    /// Serializes the task and pushes it on the queue, returning its job id
    async fn enqueue(&self, task: &Task) -> Result<JobId, QueueError>;

    /// Pops the oldest pending job, if any
    async fn dequeue(&self) -> Result<Option<TaskEnvelope>, QueueError>;

    /// Puts a job back on the queue with its attempt count bumped
    async fn requeue(&self, envelope: TaskEnvelope) -> Result<(), QueueError>;

    fn name(&self) -> &str;
}

/// In-memory FIFO queue for development and testing.
///
/// Jobs live only as long as the process; they are not shared with other processes.
pub struct InMemoryTaskQueue {
    name: String,
    jobs: Mutex<VecDeque<TaskEnvelope>>,
}

impl InMemoryTaskQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of jobs waiting to be picked up
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Copy of the waiting jobs, oldest first
    pub async fn pending(&self) -> Vec<TaskEnvelope> {
        self.jobs.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    #[instrument(skip(self, task), fields(queue = %self.name, kind = %task.kind()))]
    async fn enqueue(&self, task: &Task) -> Result<JobId, QueueError> {
        let envelope = TaskEnvelope::new(task, Utc::now())?;
        let id = envelope.id;

        self.jobs.lock().await.push_back(envelope);

        debug!(job_id = %id, "Task enqueued in memory");
        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<TaskEnvelope>, QueueError> {
        Ok(self.jobs.lock().await.pop_front())
    }

    #[instrument(skip(self, envelope), fields(queue = %self.name, job_id = %envelope.id))]
    async fn requeue(&self, mut envelope: TaskEnvelope) -> Result<(), QueueError> {
        envelope.attempt += 1;
        debug!(attempt = envelope.attempt, "Task requeued in memory");
        self.jobs.lock().await.push_back(envelope);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Redis list-backed queue. Producers LPUSH, the worker RPOPs, so jobs come out oldest first.
pub struct RedisTaskQueue {
    name: String,
    key: String,
    connection: ConnectionManager,
}

impl RedisTaskQueue {
    pub async fn connect(redis_url: &str, name: impl Into<String>) -> Result<Self, QueueError> {
        let name = name.into();
        let client = Client::open(redis_url)
            .map_err(|e| QueueError::Backend(format!("invalid REDIS_URL: {e}")))?;
        let connection = ConnectionManager::new(client).await.map_err(|e| {
            warn!(error = %e, "Unable to connect to Redis");
            QueueError::Backend(e.to_string())
        })?;

        Ok(Self {
            key: queue_key(&name),
            name,
            connection,
        })
    }

    async fn push(&self, envelope: &TaskEnvelope) -> Result<(), QueueError> {
        let encoded = envelope.to_json()?;
        let mut connection = self.connection.clone();
        connection
            .lpush::<_, _, ()>(&self.key, encoded)
            .await
            .map_err(|e| {
                warn!(error = %e, queue = %self.name, "Failed to push task to Redis");
                QueueError::Backend(e.to_string())
            })
    }
}

fn queue_key(name: &str) -> String {
    format!("rental:queue:{name}")
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    #[instrument(skip(self, task), fields(queue = %self.name, kind = %task.kind()))]
    async fn enqueue(&self, task: &Task) -> Result<JobId, QueueError> {
        let envelope = TaskEnvelope::new(task, Utc::now())?;
        self.push(&envelope).await?;

        debug!(job_id = %envelope.id, "Task enqueued in Redis");
        Ok(envelope.id)
    }

    async fn dequeue(&self) -> Result<Option<TaskEnvelope>, QueueError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .rpop(&self.key, None)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        match raw {
            Some(raw) => TaskEnvelope::from_json(&raw).map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, envelope), fields(queue = %self.name, job_id = %envelope.id))]
    async fn requeue(&self, mut envelope: TaskEnvelope) -> Result<(), QueueError> {
        envelope.attempt += 1;
        self.push(&envelope).await?;
        debug!(attempt = envelope.attempt, "Task requeued in Redis");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
