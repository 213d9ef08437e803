use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::types::TokenPair;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const SESSION_COOKIE_MAX_AGE_HOURS: i64 = 300;

/// Builds a session cookie: path `/`, HttpOnly, SameSite=Lax, 300h max-age
pub fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::hours(SESSION_COOKIE_MAX_AGE_HOURS))
        .build()
}

/// Adds both session cookies to the jar
pub fn with_session_cookies(jar: CookieJar, tokens: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone(), secure))
        .add(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone(), secure))
}

/// Expires both session cookies
pub fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}
