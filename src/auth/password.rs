//! Password hashing and verification using Argon2id

use crate::error::AppError;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with configurable parameters.
///
/// Output is a self-describing PHC string (algorithm, parameters and salt are
/// embedded), so hashes produced with different parameters still verify.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes
        let params = Params::new(65536, 3, 4, None).unwrap_or_default();

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hasher with explicit cost parameters (memory in KiB).
    pub fn with_params(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, lanes, None).map_err(|e| {
            AppError::Config(format!("Invalid Argon2 params: {}", e))
        })?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password with a fresh random salt
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

    /// Verify a password against a stored hash.
    ///
    /// A malformed stored hash verifies as `false` rather than erroring.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Failed to parse password hash: {:?}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Hash on the blocking pool; Argon2 is CPU-bound.
    pub async fn hash_blocking(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    pub async fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let hasher = self.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))
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

    fn light_hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = light_hasher();
        let hash = hasher.hash("p1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("p1", &hash));
        assert!(!hasher.verify("p2", &hash));
    }

    #[test]
    fn test_hash_is_different_each_time() {
        let hasher = light_hasher();
        let hash1 = hasher.hash("secret").unwrap();
        let hash2 = hasher.hash("secret").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("secret", &hash1));
        assert!(hasher.verify("secret", &hash2));
    }

    #[test]
    fn test_malformed_hash_is_a_mismatch() {
        let hasher = light_hasher();
        assert!(!hasher.verify("p1", "not-a-phc-string"));
        assert!(!hasher.verify("p1", ""));
    }

    #[test]
    fn test_hash_from_other_params_still_verifies() {
        let hash = light_hasher().hash("p1").unwrap();
        let other = PasswordHasher::with_params(2048, 2, 1).unwrap();
        assert!(other.verify("p1", &hash));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(PasswordHasher::with_params(1, 0, 0).is_err());
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hasher = light_hasher();
        let hash = hasher.hash_blocking("p1").await.unwrap();
        assert!(hasher.verify_blocking("p1", &hash).await.unwrap());
        assert!(!hasher.verify_blocking("nope", &hash).await.unwrap());
    }
}
