use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The subject a session speaks for. Injected into request extensions by the session middleware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: i32,
    pub email: String,
    pub username: String,
}

/// Fields shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimSet {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub iat: i64, // Issued at (standard JWT claim)
    pub exp: i64, // Expiration (standard JWT claim)
    pub iss: String,
}

impl ClaimSet {
    pub fn new(identity: &Identity, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: super::token::TOKEN_ISSUER.to_string(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }
}

/// Which role a signed token plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Decoded token claims, tagged with the token kind (`typ` on the wire)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum SessionClaims {
    Access(ClaimSet),
    Refresh(ClaimSet),
}

impl SessionClaims {
    pub fn kind(&self) -> TokenKind {
        match self {
            SessionClaims::Access(_) => TokenKind::Access,
            SessionClaims::Refresh(_) => TokenKind::Refresh,
        }
    }

    pub fn claims(&self) -> &ClaimSet {
        match self {
            SessionClaims::Access(claims) | SessionClaims::Refresh(claims) => claims,
        }
    }

    pub fn into_claims(self) -> ClaimSet {
        match self {
            SessionClaims::Access(claims) | SessionClaims::Refresh(claims) => claims,
        }
    }
}

/// Access and refresh tokens minted together at login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// A freshly minted access token and the claims it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedAccess {
    pub access_token: String,
    pub claims: ClaimSet,
}
