use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument};

use super::{
    models::AccountRole,
    service::AccountService,
    types::{
        AccountResponse, ForgotPasswordRequest, LoginRequest, LoginResponse, LoginUser,
        MessageResponse, RegisterRequest, UpdateAccountRequest,
    },
};
use crate::session::{cookies, Identity};
use crate::shared::{AppError, AppState};

/// POST /api/{role}/register
///
/// 201 even when the verification email could not be queued; see `verification_email_queued`.
#[instrument(name = "register", skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Path(role): Path<AccountRole>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let service = AccountService::from_state(&state);
    let registration = service.register(role, request).await?;

    let response = AccountResponse::new(
        &registration.account,
        registration.verification_email.is_queued(),
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/{role}/login
///
/// Sets the `token` and `refreshToken` cookies and echoes both tokens in the body.
#[instrument(name = "login", skip(state, jar, request))]
pub async fn login(
    State(state): State<AppState>,
    Path(role): Path<AccountRole>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let service = AccountService::from_state(&state);
    let (account, tokens) = service.login(role, request).await?;

    let jar = cookies::with_session_cookies(jar, &tokens, state.config.cookie_secure);
    let response = LoginResponse {
        user: LoginUser {
            email: account.email,
            username: account.username,
            role,
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
    };

    Ok((jar, Json(response)))
}

/// POST /api/{role}/logout
#[instrument(name = "logout", skip(jar, identity), fields(id = identity.id))]
pub async fn logout(
    Path(role): Path<AccountRole>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    info!(%role, "Clearing session cookies");
    (
        cookies::without_session_cookies(jar),
        Json(MessageResponse::new("Logout successful")),
    )
}

/// PUT /api/{role}/update
#[instrument(name = "update_account", skip(state, identity, request), fields(id = identity.id))]
pub async fn update_account(
    State(state): State<AppState>,
    Path(role): Path<AccountRole>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let service = AccountService::from_state(&state);
    service.update_profile(role, &identity, request).await?;

    Ok(Json(MessageResponse::new("successfully updated")))
}

/// POST /api/{role}/forgot-password
#[instrument(name = "forgot_password", skip(state, request))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Path(role): Path<AccountRole>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let service = AccountService::from_state(&state);
    service.forgot_password(role, request).await?;

    Ok(Json(MessageResponse::new("new password sent to email")))
}

/// GET /api/{role}/verify/{email}/{code}
///
/// Redirects (302) to the role's sign-in page on the frontend.
#[instrument(name = "verify_email", skip(state, code))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path((role, email, code)): Path<(AccountRole, String, String)>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1]), AppError> {
    let service = AccountService::from_state(&state);
    service.verify_email(role, &email, &code).await?;

    let target = format!(
        "{}/{}",
        state.config.frontend_url.trim_end_matches('/'),
        role.sign_in_path()
    );
    Ok((StatusCode::FOUND, [(header::LOCATION, target)]))
}

/// GET /api/{role}/me
pub async fn me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
