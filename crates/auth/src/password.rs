//! Password hashing.
//!
//! Argon2id with a per-password random salt. The work factor comes from
//! configuration so tests can run with cheap parameters.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use trade_core::config::PasswordSettings;

use crate::error::{AuthError, AuthResult};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashes and verifies passwords with a fixed Argon2id work factor.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Verified against when the account does not exist, so unknown emails
    /// cost the same as wrong passwords.
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(settings: &PasswordSettings) -> AuthResult<Self> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )
        .map_err(|e| AuthError::Internal(format!("invalid argon2 parameters: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "dummy-password-for-timing")?;

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password into a PHC string (salt included).
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        hash_with(&self.argon2, password)
    }

    /// Check a password against a stored PHC string. A malformed hash is a
    /// mismatch, never an error surfaced to the caller.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash is malformed");
                false
            }
        }
    }

    /// Burn one verification for an unknown account.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))
}

/// Minimum password policy applied at registration.
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
