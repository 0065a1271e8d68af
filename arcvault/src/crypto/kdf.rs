//! Password-based derivation of the container master key (Argon2id).

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::common::constants::KEY_SIZE;
use crate::crypto::keys::MasterKey;
use crate::crypto::CryptoError;

/// Salt length stored with the derivation parameters.
pub const SALT_SIZE: usize = 16;

/// Password-derivation parameters, written once per encrypted container
/// and replayed on every open.
///
/// The salt is not secret; it only ties the derived key to this container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub salt: [u8; SALT_SIZE],
    /// Memory cost in KiB.
    pub mem_cost_kib: u32,
    /// Iteration count.
    pub time_cost: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Fresh parameters with a random salt and the default cost factors.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        KdfParams {
            salt,
            mem_cost_kib: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }

    /// Serialize for the `encryption_key_params` row.
    pub fn to_blob(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored `encryption_key_params` row.
    pub fn from_blob(blob: &[u8]) -> Result<Self, CryptoError> {
        Ok(serde_json::from_slice(blob)?)
    }
}

/// Run the password through Argon2id with the given parameters, producing
/// the 32-byte container master key.
pub fn derive_master_key(password: &[u8], params: &KdfParams) -> Result<MasterKey, CryptoError> {
    let argon_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Kdf(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password, &params.salt, &mut key)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;

    Ok(MasterKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            salt: [7u8; SALT_SIZE],
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let params = fast_params();
        let key1 = derive_master_key(b"test-password", &params).unwrap();
        let key2 = derive_master_key(b"test-password", &params).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn different_passwords_differ() {
        let params = fast_params();
        let key1 = derive_master_key(b"password-a", &params).unwrap();
        let key2 = derive_master_key(b"password-b", &params).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn different_salts_differ() {
        let mut params_a = fast_params();
        let mut params_b = fast_params();
        params_a.salt = [1u8; SALT_SIZE];
        params_b.salt = [2u8; SALT_SIZE];
        let key1 = derive_master_key(b"same-password", &params_a).unwrap();
        let key2 = derive_master_key(b"same-password", &params_b).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn params_blob_roundtrip() {
        let params = KdfParams::generate();
        let blob = params.to_blob().unwrap();
        let parsed = KdfParams::from_blob(&blob).unwrap();
        assert_eq!(parsed.salt, params.salt);
        assert_eq!(parsed.mem_cost_kib, params.mem_cost_kib);
        assert_eq!(parsed.time_cost, params.time_cost);
        assert_eq!(parsed.parallelism, params.parallelism);
    }

    #[test]
    fn garbage_blob_is_rejected() {
        assert!(KdfParams::from_blob(b"not json at all").is_err());
    }
}
