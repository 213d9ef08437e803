use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::account::repository::AccountRepository;
use crate::config::AppConfig;
use crate::listing::repository::ListingRepository;
use crate::session::{Clock, TokenError, TokenIssuer};
use crate::tasks::{QueueError, TaskQueue};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub token_issuer: Arc<TokenIssuer>,
    pub account_repository: Arc<dyn AccountRepository + Send + Sync>,
    pub listing_repository: Arc<dyn ListingRepository + Send + Sync>,
    pub task_queue: Arc<dyn TaskQueue + Send + Sync>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
        token_issuer: Arc<TokenIssuer>,
        account_repository: Arc<dyn AccountRepository + Send + Sync>,
        listing_repository: Arc<dyn ListingRepository + Send + Sync>,
        task_queue: Arc<dyn TaskQueue + Send + Sync>,
    ) -> Self {
        Self {
            config,
            clock,
            token_issuer,
            account_repository,
            listing_repository,
            task_queue,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Task queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Signing(msg) => AppError::Internal(msg),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(error: QueueError) -> Self {
        AppError::Queue(error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Queue(_) | AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
