use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    models::{AccountModel, AccountRole, NewAccount, NewEmailVerification},
    password::{generate_password, generate_verification_code, hash_password, verify_password},
    repository::AccountRepository,
    types::{ForgotPasswordRequest, LoginRequest, RegisterRequest, UpdateAccountRequest},
};
use crate::session::{Clock, Identity, TokenIssuer, TokenPair};
use crate::shared::{AppError, AppState};
use crate::tasks::{JobId, Task, TaskQueue};

/// Characters escaped in the email segment of a verification link
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What happened to the verification email of a new account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailDispatch {
    Queued(JobId),
    /// The account was kept; the reason is only logged and reported as a flag
    Failed(String),
}

impl EmailDispatch {
    pub fn is_queued(&self) -> bool {
        matches!(self, EmailDispatch::Queued(_))
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub account: AccountModel,
    pub verification_email: EmailDispatch,
}

/// Service for account lifecycle: sign-up, sign-in, profile and email verification
pub struct AccountService {
    repository: Arc<dyn AccountRepository + Send + Sync>,
    task_queue: Arc<dyn TaskQueue + Send + Sync>,
    token_issuer: Arc<TokenIssuer>,
    clock: Arc<dyn Clock>,
    public_base_url: String,
}

impl AccountService {
    pub fn new(
        repository: Arc<dyn AccountRepository + Send + Sync>,
        task_queue: Arc<dyn TaskQueue + Send + Sync>,
        token_issuer: Arc<TokenIssuer>,
        clock: Arc<dyn Clock>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            task_queue,
            token_issuer,
            clock,
            public_base_url: public_base_url.into(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            Arc::clone(&state.account_repository),
            Arc::clone(&state.task_queue),
            Arc::clone(&state.token_issuer),
            Arc::clone(&state.clock),
            state.config.public_base_url.clone(),
        )
    }

    /// Creates the account and its verification record, then queues the verification email.
    ///
    /// A queue failure does not undo the account; it is reported through
    /// [`Registration::verification_email`].
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(
        &self,
        role: AccountRole,
        request: RegisterRequest,
    ) -> Result<Registration, AppError> {
        request.validate()?;

        // An email belongs to one role only
        for existing_role in AccountRole::ALL {
            if self
                .repository
                .get_account_by_email(existing_role, &request.email)
                .await?
                .is_some()
            {
                warn!(role = %existing_role, "Email already registered");
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        let account = self
            .repository
            .create_account(
                role,
                &NewAccount {
                    username: request.username,
                    email: request.email,
                    password_hash: hash_password(&request.password)?,
                },
            )
            .await?;

        let code = generate_verification_code();
        let verification = NewEmailVerification::new(
            account.username.clone(),
            account.email.clone(),
            code.clone(),
            self.clock.now(),
        );
        self.repository
            .create_email_verification(role, &verification)
            .await?;
        debug!(id = account.id, "Verification record created");

        let link = self.verification_link(role, &account.email, &code);
        let task = Task::verification_email(&account.email, link, &account.username);
        let verification_email = match self.task_queue.enqueue(&task).await {
            Ok(job_id) => EmailDispatch::Queued(job_id),
            Err(e) => {
                warn!(id = account.id, error = %e, "Could not queue verification email");
                EmailDispatch::Failed(e.to_string())
            }
        };

        info!(
            id = account.id,
            %role,
            queued = verification_email.is_queued(),
            "Account registered"
        );

        Ok(Registration {
            account,
            verification_email,
        })
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(
        &self,
        role: AccountRole,
        request: LoginRequest,
    ) -> Result<(AccountModel, TokenPair), AppError> {
        request.validate()?;

        let account = self
            .repository
            .get_account_by_email(role, &request.email)
            .await?
            .ok_or_else(|| AppError::BadRequest("User not found".to_string()))?;

        if !account.is_email_verified {
            return Err(AppError::Unauthorized("Email not verified".to_string()));
        }

        if !verify_password(&request.password, &account.password_hash)? {
            warn!(id = account.id, "Wrong password");
            return Err(AppError::BadRequest(
                "Incorrect email or password".to_string(),
            ));
        }

        let tokens = self.token_issuer.issue(&account.identity())?;
        info!(id = account.id, %role, "Login succeeded");

        Ok((account, tokens))
    }

    /// Changes username and password of the signed-in account
    #[instrument(skip(self, identity, request), fields(id = identity.id))]
    pub async fn update_profile(
        &self,
        role: AccountRole,
        identity: &Identity,
        request: UpdateAccountRequest,
    ) -> Result<(), AppError> {
        request.validate()?;

        // Sessions are role-agnostic; the role comes from the route
        let account = self
            .repository
            .get_account_by_email(role, &identity.email)
            .await?
            .ok_or_else(|| AppError::BadRequest("authorized user only".to_string()))?;

        if !verify_password(&request.current_password, &account.password_hash)? {
            return Err(AppError::BadRequest(
                "invalid current password".to_string(),
            ));
        }

        let password_hash = hash_password(&request.new_password)?;
        self.repository
            .update_profile(role, account.id, &request.username, &password_hash)
            .await?;

        info!(id = account.id, "Profile updated");
        Ok(())
    }

    /// Replaces the password with a generated one and mails it out.
    ///
    /// If the email cannot be queued the previous hash is put back, so the old password
    /// keeps working and the request fails as a whole.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn forgot_password(
        &self,
        role: AccountRole,
        request: ForgotPasswordRequest,
    ) -> Result<JobId, AppError> {
        let account = self
            .repository
            .get_account_by_email(role, &request.email)
            .await?
            .ok_or_else(|| AppError::BadRequest("user not found".to_string()))?;

        let password = generate_password();
        let password_hash = hash_password(&password)?;
        self.repository
            .update_password_by_email(role, &account.email, &password_hash)
            .await?;

        let task = Task::forgot_password_email(&account.email, password, &account.username);
        let job_id = match self.task_queue.enqueue(&task).await {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(id = account.id, error = %e, "Could not queue password email, restoring old password");
                self.repository
                    .update_password_by_email(role, &account.email, &account.password_hash)
                    .await?;
                return Err(e.into());
            }
        };

        info!(id = account.id, %job_id, "Password reset email queued");
        Ok(job_id)
    }

    #[instrument(skip(self, secret_code))]
    pub async fn verify_email(
        &self,
        role: AccountRole,
        email: &str,
        secret_code: &str,
    ) -> Result<(), AppError> {
        let record = self
            .repository
            .get_email_verification(role, email, secret_code)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid verification link".to_string()))?;

        if record.is_used {
            return Err(AppError::BadRequest("Email already verified".to_string()));
        }
        if record.is_expired(self.clock.now()) {
            return Err(AppError::BadRequest(
                "Verification link expired".to_string(),
            ));
        }

        self.repository
            .mark_email_verification_used(role, email, secret_code)
            .await?;
        self.repository.mark_email_verified(role, email).await?;

        info!(%role, "Email verified");
        Ok(())
    }

    fn verification_link(&self, role: AccountRole, email: &str, code: &str) -> String {
        format!(
            "{}/api/{}/verify/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            role,
            utf8_percent_encode(email, PATH_SEGMENT),
            code
        )
    }
}
