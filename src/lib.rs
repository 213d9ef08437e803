// Library crate for the rental listing backend
// This file exposes the public API for integration tests

pub mod account;
pub mod config;
pub mod listing;
pub mod mail;
pub mod routes;
pub mod session;
pub mod shared;
pub mod tasks;

// Re-export commonly used types for easier access in tests
pub use account::{repository::AccountRepository, AccountRole, AccountService};
pub use config::AppConfig;
pub use listing::{repository::ListingRepository, ListingService};
pub use mail::{EmailMessage, EmailSender, LogEmailSender, MailError};
pub use routes::build_router;
pub use session::{Clock, Identity, ManualClock, SystemClock, TokenIssuer};
pub use shared::{AppError, AppState};
pub use tasks::{InMemoryTaskQueue, Task, TaskMux, TaskQueue, TaskWorker};
