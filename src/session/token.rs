use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use super::clock::Clock;
use super::types::{ClaimSet, Identity, RefreshedAccess, SessionClaims, TokenKind, TokenPair};

pub const TOKEN_ISSUER: &str = "rental";
pub const ACCESS_TOKEN_TTL_HOURS: i64 = 72;
pub const REFRESH_TOKEN_TTL_HOURS: i64 = 144;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid: {0}")]
    Invalid(String),

    #[error("token is expired")]
    Expired,

    #[error("expected {expected} token, got {actual} token")]
    WrongKind {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Mints and checks the signed session tokens.
///
/// Holds the signing secret handed over at construction and a clock that every
/// expiry check is made against. Signature and issuer are checked by
/// `jsonwebtoken`; expiry is checked here so it follows the injected clock.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Signing("signing secret is empty".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[TOKEN_ISSUER]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        })
    }

    /// Mints an access token (72h) and a refresh token (144h) for the identity
    #[instrument(skip(self, identity), fields(id = identity.id))]
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        let now = self.clock.now();
        let access = ClaimSet::new(identity, now, now + Duration::hours(ACCESS_TOKEN_TTL_HOURS));
        let refresh = ClaimSet::new(identity, now, now + Duration::hours(REFRESH_TOKEN_TTL_HOURS));

        debug!(
            access_exp = access.exp,
            refresh_exp = refresh.exp,
            "Issuing session token pair"
        );

        Ok(TokenPair {
            access_token: self.sign(&SessionClaims::Access(access))?,
            refresh_token: self.sign(&SessionClaims::Refresh(refresh))?,
        })
    }

    /// Checks signature, structure and expiry. Accepts either token kind.
    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let claims = self.decode_claims(token)?;
        self.check_expiry(claims)
    }

    /// Like [`verify`](Self::verify), but only accepts access tokens
    pub fn verify_access(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_kind(token, TokenKind::Access)
    }

    /// Like [`verify`](Self::verify), but only accepts refresh tokens
    pub fn verify_refresh(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_kind(token, TokenKind::Refresh)
    }

    /// Mints a new 72h access token from a valid, unexpired refresh token
    #[instrument(skip(self, refresh_token))]
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshedAccess, TokenError> {
        let refresh = self.verify_refresh(refresh_token)?.into_claims();

        let now = self.clock.now();
        let claims = ClaimSet::new(
            &refresh.identity(),
            now,
            now + Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        );
        let access_token = self.sign(&SessionClaims::Access(claims.clone()))?;

        debug!(id = claims.id, exp = claims.exp, "Minted access token from refresh token");

        Ok(RefreshedAccess {
            access_token,
            claims,
        })
    }

    fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<SessionClaims, TokenError> {
        let claims = self.decode_claims(token)?;
        if claims.kind() != expected {
            debug!(%expected, actual = %claims.kind(), "Token kind mismatch");
            return Err(TokenError::WrongKind {
                expected,
                actual: claims.kind(),
            });
        }
        self.check_expiry(claims)
    }

    fn decode_claims(&self, token: &str) -> Result<SessionClaims, TokenError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Failed to decode session token");
                TokenError::Invalid(e.to_string())
            })
    }

    fn check_expiry(&self, claims: SessionClaims) -> Result<SessionClaims, TokenError> {
        if claims.claims().is_expired(self.clock.now()) {
            debug!(exp = claims.claims().exp, kind = %claims.kind(), "Session token expired");
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            debug!(error = %e, "Failed to encode session token");
            TokenError::Signing(e.to_string())
        })
    }
}
