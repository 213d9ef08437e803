use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;

use crate::shared::AppError;

const GENERATED_PASSWORD_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789@#$%&";
pub const GENERATED_PASSWORD_LEN: usize = 20;

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("argon2 hash: {e}")))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("bad password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Replacement password handed out by forgot-password
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.random_range(0..GENERATED_PASSWORD_CHARS.len());
            GENERATED_PASSWORD_CHARS[idx] as char
        })
        .collect()
}

/// Five-digit code embedded in verification links
pub fn generate_verification_code() -> String {
    rand::rng().random_range(10000..=99999).to_string()
}
