use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::session::Identity;

/// How long an email verification code stays usable
pub const VERIFICATION_CODE_TTL_MINUTES: i64 = 15;

/// Users rent, admins list. Each role has its own account table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountRole {
    User,
    Admin,
}

impl AccountRole {
    pub const ALL: [AccountRole; 2] = [AccountRole::User, AccountRole::Admin];

    pub fn accounts_table(&self) -> &'static str {
        match self {
            AccountRole::User => "users",
            AccountRole::Admin => "admins",
        }
    }

    pub fn verifications_table(&self) -> &'static str {
        match self {
            AccountRole::User => "user_verify_emails",
            AccountRole::Admin => "admin_verify_emails",
        }
    }

    /// Frontend page to land on after verifying an email
    pub fn sign_in_path(&self) -> &'static str {
        match self {
            AccountRole::User => "sign-in",
            AccountRole::Admin => "signin-admin",
        }
    }
}

/// Database model for the users and admins tables
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountModel {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub is_email_verified: bool,
}

impl AccountModel {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }
}

/// Fields supplied when creating an account; id and timestamps come from the store
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Database model for the email verification tables
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct EmailVerificationModel {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub secret_code: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl EmailVerificationModel {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expired_at
    }
}

#[derive(Debug, Clone)]
pub struct NewEmailVerification {
    pub username: String,
    pub email: String,
    pub secret_code: String,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl NewEmailVerification {
    pub fn new(username: String, email: String, secret_code: String, now: DateTime<Utc>) -> Self {
        Self {
            username,
            email,
            secret_code,
            created_at: now,
            expired_at: now + Duration::minutes(VERIFICATION_CODE_TTL_MINUTES),
        }
    }
}
