// Background email jobs: the queue client used by request handlers, and the
// worker that drains it.

// Public API - what other modules can use
pub use handlers::{ForgotPasswordEmailHandler, TaskHandler, TaskMux, VerificationEmailHandler};
pub use queue::{InMemoryTaskQueue, RedisTaskQueue, TaskQueue};
pub use types::{
    ForgotPasswordEmailPayload, JobId, QueueError, Task, TaskEnvelope, TaskError, TaskKind,
    VerificationEmailPayload,
};
pub use worker::{JobOutcome, TaskWorker};

// Internal modules
mod handlers;
mod queue;
mod types;
mod worker;
