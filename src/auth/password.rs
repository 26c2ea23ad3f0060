//! Password hashing using Argon2id

use crate::{config::AppConfig, error::AppError};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher as _, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with configurable parameters
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// m=64MiB, t=3, p=4
    pub fn new() -> Self {
        Self::with_params(65536, 3, 4)
    }

    /// Cheaper parameters for tests and tooling
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Self {
        let params = Params::new(m_cost, t_cost, p_cost, None).unwrap_or_default();
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Self { argon2 }
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, config: &AppConfig) -> Result<(), AppError> {
        let min_length = config.security.password_min_length;

        if password.chars().count() < min_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                min_length
            )));
        }

        if password.trim().is_empty() {
            return Err(AppError::BadRequest("Password must not be blank".to_string()));
        }

        Ok(())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(8, 1, 1)
    }

    #[test]
    fn test_hash_matches_password() {
        let hash = hasher().hash("Emerald-Cut-42").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"Emerald-Cut-42", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"Princess-Cut-42", &parsed)
            .is_err());
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = hasher();
        let first = hasher.hash("Emerald-Cut-42").unwrap();
        let second = hasher.hash("Emerald-Cut-42").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_default_params_produce_argon2id() {
        let hash = PasswordHasher::new().hash("Emerald-Cut-42").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }
}
