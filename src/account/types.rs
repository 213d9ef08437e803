use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{AccountModel, AccountRole};
use crate::shared::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_USERNAME_LEN: usize = 3;

/// Request payload for creating an account
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.is_empty() || !self.username.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::BadRequest(
                "username must be alphanumeric".to_string(),
            ));
        }
        validate_password(&self.password)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    /// False when the account exists but the verification email could not be queued
    pub verification_email_queued: bool,
}

impl AccountResponse {
    pub fn new(account: &AccountModel, verification_email_queued: bool) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            created_at: account.created_at,
            verification_email_queued,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AppError::BadRequest("password is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub username: String,
    pub role: AccountRole,
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: LoginUser,
}

/// Profile update; every field is required
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(rename = "currentPassword", default)]
    pub current_password: String,
    #[serde(rename = "newPassword", default)]
    pub new_password: String,
    #[serde(default)]
    pub username: String,
}

impl UpdateAccountRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.current_password.is_empty()
            || self.new_password.is_empty()
            || self.username.is_empty()
        {
            return Err(AppError::BadRequest("please enter all fields".to_string()));
        }
        if self.username.chars().count() < MIN_USERNAME_LEN {
            return Err(AppError::BadRequest(format!(
                "username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        validate_password(&self.new_password)
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// Loose check; deliverability is proven by the verification link.
fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::BadRequest("invalid email address".to_string())),
    }
}
