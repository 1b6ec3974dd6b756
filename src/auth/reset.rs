//! Password-reset secrets.
//!
//! The digest is plain SHA-256 without a salt: a submitted secret has to be
//! turned into the stored value before the owning credential is known, so
//! lookup is by equality on the digest. The short expiry window is what
//! bounds exposure of a leaked digest.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

pub const SECRET_BYTES: usize = 32;

/// Fresh reset secret, hex encoded. Shown to the user once and never stored.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Storable digest of a reset secret.
pub fn digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
