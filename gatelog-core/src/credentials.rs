//! Password hashing for user records.
//!
//! Login is not offered, but a password supplied on user update is stored
//! as an Argon2id PHC string so a later auth layer can verify it.

use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString,
    },
};
use rand::{TryRngCore, rngs::OsRng};

use crate::error::{CoreError, Result};

/// Passwords shorter than this are ignored on update.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
    const DEFAULT_ITERATIONS: u32 = 3;
    const DEFAULT_PARALLELISM: u32 = 1;
    const SALT_LENGTH: usize = Salt::RECOMMENDED_LENGTH;

    pub fn new() -> Result<Self> {
        let params = ParamsBuilder::new()
            .m_cost(Self::DEFAULT_MEMORY_KIB)
            .t_cost(Self::DEFAULT_ITERATIONS)
            .p_cost(Self::DEFAULT_PARALLELISM)
            .output_len(32)
            .build()
            .map_err(|err| CoreError::Credential(err.to_string()))?;
        Ok(Self::with_params(params))
    }

    /// Caller-specified Argon2 parameters, for tests or small hosts.
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(
                Algorithm::Argon2id,
                Version::default(),
                params,
            ),
        }
    }

    /// Whether a supplied password is long enough to be stored.
    pub fn accepts(password: &str) -> bool {
        password.chars().count() >= MIN_PASSWORD_LEN
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| CoreError::Credential(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|err| CoreError::Credential(err.to_string()))?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| CoreError::Credential(err.to_string()))?;
        Ok(hash.to_string())
    }

    pub fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|err| CoreError::Credential(err.to_string()))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        // Minimal cost keeps the suite fast.
        let params = ParamsBuilder::new()
            .m_cost(8 * 1024)
            .t_cost(1)
            .p_cost(1)
            .output_len(32)
            .build()
            .expect("params");
        CredentialHasher::with_params(params)
    }

    #[test]
    fn password_round_trip() {
        let hasher = hasher();
        let hash = hasher.hash_password("hunter22").expect("hash");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("hunter22", &hash).expect("verify"));
        assert!(!hasher.verify_password("hunter23", &hash).expect("verify"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = hasher();
        let a = hasher.hash_password("hunter22").expect("hash");
        let b = hasher.hash_password("hunter22").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let hasher = hasher();
        assert!(matches!(
            hasher.verify_password("hunter22", "not-a-phc-string"),
            Err(CoreError::Credential(_))
        ));
    }

    #[test]
    fn short_passwords_are_not_accepted() {
        assert!(!CredentialHasher::accepts("12345"));
        assert!(CredentialHasher::accepts("123456"));
    }
}
