use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HashConfig;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Stored hash is not a parseable PHC string.
    #[error("malformed password hash: {0}")]
    Format(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Argon2id hasher with a fixed work factor.
///
/// Both operations run on the blocking pool so the cost factor never stalls
/// the request executor.
#[derive(Clone)]
pub struct Hasher {
    params: Params,
    // hash of a throwaway password under the same parameters
    dummy: Arc<str>,
}

impl Hasher {
    pub fn new(cfg: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        let dummy = hash_with(params.clone(), "unused-password-placeholder")?;
        Ok(Self {
            params,
            dummy: dummy.into(),
        })
    }

    pub async fn hash(&self, plain: &str) -> Result<String, HashError> {
        let params = self.params.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hash_with(params, &plain)).await?
    }

    pub async fn verify(&self, plain: &str, hash: &str) -> Result<bool, HashError> {
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&plain, &hash)).await?
    }

    /// Spends the cost of a real verification when there is no stored hash,
    /// so an unknown account answers as slowly as a wrong password.
    pub async fn verify_dummy(&self, plain: &str) -> Result<(), HashError> {
        self.verify(plain, &self.dummy).await.map(|_| ())
    }
}

fn hash_with(params: Params, plain: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashError::Hashing(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Parameters are read back from the PHC string, so hashes made under an
/// older work factor still verify.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        HashError::Format(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
