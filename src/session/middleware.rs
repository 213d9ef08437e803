use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument, warn};

use super::cookies::{session_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use super::token::TokenError;
use crate::shared::{AppError, AppState};

/// Cookie session middleware - validates the `token` cookie and adds the caller's `Identity` to the request.
///
/// An expired access token is renewed from the `refreshToken` cookie; only on that path are cookies rewritten.
/// Usage: .layer(middleware::from_fn_with_state(app_state.clone(), session::require_session))
/// Handlers can then extract Extension(identity): Extension<Identity>.
#[instrument(skip(state, jar, req, next), fields(uri = %req.uri()))]
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<(CookieJar, Response), AppError> {
    let issuer = &state.token_issuer;

    let access_token = jar
        .get(ACCESS_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            warn!("Missing access token cookie");
            AppError::Unauthorized("unauthorized".to_string())
        })?;

    match issuer.verify_access(&access_token) {
        Ok(claims) => {
            let identity = claims.claims().identity();
            info!(id = identity.id, "Session validated");
            req.extensions_mut().insert(identity);
            Ok((jar, next.run(req).await))
        }
        Err(TokenError::Expired) => {
            let refresh_token = jar
                .get(REFRESH_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .ok_or_else(|| {
                    warn!("Access token expired and no refresh token cookie present");
                    AppError::Unauthorized("unauthorized".to_string())
                })?;

            let refreshed = issuer.refresh(&refresh_token).map_err(|e| {
                warn!(error = %e, "Refresh token rejected");
                AppError::Unauthorized("Invalid refresh token".to_string())
            })?;

            let identity = refreshed.claims.identity();
            info!(id = identity.id, "Access token renewed from refresh token");
            req.extensions_mut().insert(identity);
            let response = next.run(req).await;

            // A cookie the handler set itself (logout clears both) wins over the renewal
            let secure = state.config.cookie_secure;
            let mut jar = jar;
            if !sets_cookie(&response, ACCESS_COOKIE) {
                jar = jar.add(session_cookie(ACCESS_COOKIE, refreshed.access_token, secure));
            }
            if !sets_cookie(&response, REFRESH_COOKIE) {
                jar = jar.add(session_cookie(REFRESH_COOKIE, refresh_token, secure));
            }
            Ok((jar, response))
        }
        Err(e) => {
            warn!(error = %e, "Session authentication failed");
            Err(AppError::Unauthorized(e.to_string()))
        }
    }
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split_once('='))
        .any(|(cookie_name, _)| cookie_name.trim() == name)
}
