// Public API - what other modules can use
pub use handlers::{forgot_password, login, logout, me, register, update_account, verify_email};
pub use models::{AccountModel, AccountRole};
pub use service::{AccountService, EmailDispatch, Registration};

// Internal modules
mod handlers;
pub mod models;
pub mod password;
pub mod repository;
mod service;
pub mod types;
