//! Password policy and password hashes.
//!
//! Hashes are Argon2id with default parameters, stored as PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`). Older parameter sets
//! still verify since the string carries its own parameters.

use argon2::Argon2;
use argon2::password_hash::{self, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

const SALT_LEN: usize = 16;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be at least 6 characters")]
    TooShort,

    #[error("password must contain an uppercase letter")]
    MissingUppercase,

    #[error("password must contain a lowercase letter")]
    MissingLowercase,

    #[error("password must contain a digit")]
    MissingDigit,

    #[error("password must contain a special character")]
    MissingSpecial,

    #[error("stored password hash is malformed")]
    MalformedHash,

    #[error("failed to hash password: {0}")]
    Hashing(String),
}

/// Enforce the registration password policy: at least six characters with
/// one uppercase, one lowercase, one digit and one special character.
pub fn check_password_policy(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort);
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(PasswordError::MissingUppercase);
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(PasswordError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::MissingDigit);
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        return Err(PasswordError::MissingSpecial);
    }
    Ok(())
}

/// A stored password hash, validated as an Argon2 PHC string.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    phc: String,
}

impl PasswordHash {
    /// Hash a password under a fresh random salt.
    pub fn derive(password: &str) -> Result<Self, PasswordError> {
        let salt_bytes: [u8; SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hashing(e.to_string()))?;

        let phc = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();
        Ok(Self { phc })
    }

    /// Parse the stored form produced by [`PasswordHash::encode`].
    pub fn parse(encoded: &str) -> Result<Self, PasswordError> {
        let parsed = password_hash::PasswordHash::new(encoded).map_err(|_| PasswordError::MalformedHash)?;
        if !matches!(parsed.algorithm.as_str(), "argon2id" | "argon2i" | "argon2d") || parsed.hash.is_none() {
            return Err(PasswordError::MalformedHash);
        }
        Ok(Self {
            phc: encoded.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        self.phc.clone()
    }

    /// Constant-time check of `candidate` against the stored hash.
    pub fn verify(&self, candidate: &str) -> bool {
        let Ok(parsed) = password_hash::PasswordHash::new(&self.phc) else {
            return false;
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordHash").finish_non_exhaustive()
    }
}
