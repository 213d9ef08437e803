use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{
    AccountModel, AccountRole, EmailVerificationModel, NewAccount, NewEmailVerification,
};
use crate::shared::AppError;

/// Trait for account and email verification storage
#[async_trait]
pub trait AccountRepository {
    async fn create_account(
        &self,
        role: AccountRole,
        account: &NewAccount,
    ) -> Result<AccountModel, AppError>;
    async fn get_account_by_email(
        &self,
        role: AccountRole,
        email: &str,
    ) -> Result<Option<AccountModel>, AppError>;
    async fn update_profile(
        &self,
        role: AccountRole,
        id: i32,
        username: &str,
        password_hash: &str,
    ) -> Result<(), AppError>;
    async fn update_password_by_email(
        &self,
        role: AccountRole,
        email: &str,
        password_hash: &str,
    ) -> Result<(), AppError>;
    async fn mark_email_verified(&self, role: AccountRole, email: &str) -> Result<(), AppError>;
    async fn create_email_verification(
        &self,
        role: AccountRole,
        verification: &NewEmailVerification,
    ) -> Result<EmailVerificationModel, AppError>;
    async fn get_email_verification(
        &self,
        role: AccountRole,
        email: &str,
        secret_code: &str,
    ) -> Result<Option<EmailVerificationModel>, AppError>;
    async fn mark_email_verification_used(
        &self,
        role: AccountRole,
        email: &str,
        secret_code: &str,
    ) -> Result<(), AppError>;
}

#[derive(Default)]
struct AccountTables {
    next_account_id: i32,
    next_verification_id: i64,
    accounts: HashMap<(AccountRole, String), AccountModel>,
    verifications: Vec<(AccountRole, EmailVerificationModel)>,
}

/// In-memory implementation of AccountRepository for development and testing
///
/// Data is stored in memory and will be lost when the application restarts.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    tables: Mutex<AccountTables>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of accounts stored for a role
    pub async fn account_count(&self, role: AccountRole) -> usize {
        self.tables
            .lock()
            .await
            .accounts
            .keys()
            .filter(|(r, _)| *r == role)
            .count()
    }

    /// Latest verification record for an email (useful in tests)
    pub async fn latest_verification(
        &self,
        role: AccountRole,
        email: &str,
    ) -> Option<EmailVerificationModel> {
        self.tables
            .lock()
            .await
            .verifications
            .iter()
            .rev()
            .find(|(r, v)| *r == role && v.email == email)
            .map(|(_, v)| v.clone())
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    #[instrument(skip(self, account), fields(email = %account.email))]
    async fn create_account(
        &self,
        role: AccountRole,
        account: &NewAccount,
    ) -> Result<AccountModel, AppError> {
        let mut tables = self.tables.lock().await;
        // Emails are unique across both roles
        let taken = AccountRole::ALL
            .iter()
            .any(|r| tables.accounts.contains_key(&(*r, account.email.clone())));
        if taken {
            warn!("Account already exists in memory");
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
        let key = (role, account.email.clone());

        tables.next_account_id += 1;
        let model = AccountModel {
            id: tables.next_account_id,
            username: account.username.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            created_at: Utc::now(),
            is_email_verified: false,
        };
        tables.accounts.insert(key, model.clone());

        debug!(id = model.id, "Account created in memory");
        Ok(model)
    }

    async fn get_account_by_email(
        &self,
        role: AccountRole,
        email: &str,
    ) -> Result<Option<AccountModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.get(&(role, email.to_string())).cloned())
    }

    #[instrument(skip(self, password_hash))]
    async fn update_profile(
        &self,
        role: AccountRole,
        id: i32,
        username: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .iter_mut()
            .find(|((r, _), a)| *r == role && a.id == id)
            .map(|(_, a)| a)
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        account.username = username.to_string();
        account.password_hash = password_hash.to_string();
        Ok(())
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password_by_email(
        &self,
        role: AccountRole,
        email: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(&(role, email.to_string()))
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        account.password_hash = password_hash.to_string();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_email_verified(&self, role: AccountRole, email: &str) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(&(role, email.to_string()))
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        account.is_email_verified = true;
        Ok(())
    }

    #[instrument(skip(self, verification), fields(email = %verification.email))]
    async fn create_email_verification(
        &self,
        role: AccountRole,
        verification: &NewEmailVerification,
    ) -> Result<EmailVerificationModel, AppError> {
        let mut tables = self.tables.lock().await;
        tables.next_verification_id += 1;

        let model = EmailVerificationModel {
            id: tables.next_verification_id,
            username: verification.username.clone(),
            email: verification.email.clone(),
            secret_code: verification.secret_code.clone(),
            is_used: false,
            created_at: verification.created_at,
            expired_at: verification.expired_at,
        };
        tables.verifications.push((role, model.clone()));

        Ok(model)
    }

    async fn get_email_verification(
        &self,
        role: AccountRole,
        email: &str,
        secret_code: &str,
    ) -> Result<Option<EmailVerificationModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .verifications
            .iter()
            .rev()
            .find(|(r, v)| *r == role && v.email == email && v.secret_code == secret_code)
            .map(|(_, v)| v.clone()))
    }

    #[instrument(skip(self, secret_code))]
    async fn mark_email_verification_used(
        &self,
        role: AccountRole,
        email: &str,
        secret_code: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let mut updated = 0;
        for (r, v) in tables.verifications.iter_mut() {
            if *r == role && v.email == email && v.secret_code == secret_code {
                v.is_used = true;
                updated += 1;
            }
        }

        if updated == 0 {
            return Err(AppError::NotFound(
                "Verification record not found".to_string(),
            ));
        }
        Ok(())
    }
}

/// PostgreSQL implementation of account repository
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database_error(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return AppError::Conflict("Email already exists".to_string());
        }
    }
    warn!(error = %error, "Database query failed");
    AppError::DatabaseError(error.to_string())
}

fn require_one_row(rows_affected: u64, what: &str) -> Result<(), AppError> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("{what} not found")));
    }
    Ok(())
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    #[instrument(skip(self, account), fields(email = %account.email))]
    async fn create_account(
        &self,
        role: AccountRole,
        account: &NewAccount,
    ) -> Result<AccountModel, AppError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // The primary key on account_emails is what keeps an email to one role
        sqlx::query("INSERT INTO account_emails (email, role) VALUES ($1, $2)")
            .bind(&account.email)
            .bind(role.to_string())
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        let sql = format!(
            "INSERT INTO {} (username, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, username, email, password_hash, created_at, is_email_verified",
            role.accounts_table()
        );

        let model = sqlx::query_as::<_, AccountModel>(&sql)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(database_error)?;

        tx.commit().await.map_err(database_error)?;

        debug!(id = model.id, "Account created in database");
        Ok(model)
    }

    #[instrument(skip(self))]
    async fn get_account_by_email(
        &self,
        role: AccountRole,
        email: &str,
    ) -> Result<Option<AccountModel>, AppError> {
        let sql = format!(
            "SELECT id, username, email, password_hash, created_at, is_email_verified \
             FROM {} WHERE email = $1",
            role.accounts_table()
        );

        sqlx::query_as::<_, AccountModel>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self, password_hash))]
    async fn update_profile(
        &self,
        role: AccountRole,
        id: i32,
        username: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET username = $2, password_hash = $3 WHERE id = $1",
            role.accounts_table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "Account")
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password_by_email(
        &self,
        role: AccountRole,
        email: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET password_hash = $2 WHERE email = $1",
            role.accounts_table()
        );

        let result = sqlx::query(&sql)
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "Account")
    }

    #[instrument(skip(self))]
    async fn mark_email_verified(&self, role: AccountRole, email: &str) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET is_email_verified = TRUE WHERE email = $1",
            role.accounts_table()
        );

        let result = sqlx::query(&sql)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "Account")
    }

    #[instrument(skip(self, verification), fields(email = %verification.email))]
    async fn create_email_verification(
        &self,
        role: AccountRole,
        verification: &NewEmailVerification,
    ) -> Result<EmailVerificationModel, AppError> {
        let sql = format!(
            "INSERT INTO {} (username, email, secret_code, created_at, expired_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, username, email, secret_code, is_used, created_at, expired_at",
            role.verifications_table()
        );

        sqlx::query_as::<_, EmailVerificationModel>(&sql)
            .bind(&verification.username)
            .bind(&verification.email)
            .bind(&verification.secret_code)
            .bind(verification.created_at)
            .bind(verification.expired_at)
            .fetch_one(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self, secret_code))]
    async fn get_email_verification(
        &self,
        role: AccountRole,
        email: &str,
        secret_code: &str,
    ) -> Result<Option<EmailVerificationModel>, AppError> {
        let sql = format!(
            "SELECT id, username, email, secret_code, is_used, created_at, expired_at \
             FROM {} WHERE email = $1 AND secret_code = $2 ORDER BY id DESC LIMIT 1",
            role.verifications_table()
        );

        sqlx::query_as::<_, EmailVerificationModel>(&sql)
            .bind(email)
            .bind(secret_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self, secret_code))]
    async fn mark_email_verification_used(
        &self,
        role: AccountRole,
        email: &str,
        secret_code: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET is_used = TRUE WHERE email = $1 AND secret_code = $2",
            role.verifications_table()
        );

        let result = sqlx::query(&sql)
            .bind(email)
            .bind(secret_code)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "Verification record")
    }
}
