//! The two-level key hierarchy: container master key, per-file master
//! keys, and the SHAKE-256 stretch into filename and file-data subkeys.
//!
//! Filename sealing uses a fixed zero nonce; that is only sound because
//! every file derives a fresh [`FilenameKey`] from a fresh
//! [`FileMasterKey`]. The newtypes keep the key kinds apart so one cannot
//! stand in for another.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use zeroize::Zeroize;

use crate::common::constants::{KEY_SIZE, NONCE_SIZE};
use crate::crypto::CryptoError;

macro_rules! key_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name {
            bytes: [u8; KEY_SIZE],
        }

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self { bytes }
            }

            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.bytes
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.bytes.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

key_newtype! {
    /// The container master key, derived from the password. Seals the
    /// per-file master keys and nothing else.
    MasterKey
}

key_newtype! {
    /// 32 random bytes generated per encrypted file; stretched into the
    /// filename key and the file-data key.
    FileMasterKey
}

key_newtype! {
    /// Seals the padded plaintext file name under a fixed zero nonce.
    FilenameKey
}

key_newtype! {
    /// Keys the streaming encryption layer for the file body.
    FileDataKey
}

/// Generate a fresh random per-file master key.
pub fn generate_file_master_key() -> FileMasterKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    FileMasterKey::from_bytes(bytes)
}

/// Nonce for sealing a per-file key: the file id, big-endian, in the
/// first 8 bytes; the remaining bytes zero. File ids are unique and never
/// recycled within a container, so the nonce never repeats under one
/// master key.
fn file_id_nonce(id: i64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..8].copy_from_slice(&(id as u64).to_be_bytes());
    nonce
}

/// Seal a per-file master key under the container master key.
pub fn wrap_file_key(
    master: &MasterKey,
    id: i64,
    file_key: &FileMasterKey,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(master.as_bytes()));
    let nonce = file_id_nonce(id);
    cipher
        .encrypt(Nonce::from_slice(&nonce), file_key.as_bytes().as_slice())
        .map_err(|_| CryptoError::Seal)
}

/// Open a sealed per-file master key. Fails if the master key is wrong or
/// the record was tampered with.
pub fn unwrap_file_key(
    master: &MasterKey,
    id: i64,
    wrapped: &[u8],
) -> Result<FileMasterKey, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(master.as_bytes()));
    let nonce = file_id_nonce(id);
    let mut plain = cipher
        .decrypt(Nonce::from_slice(&nonce), wrapped)
        .map_err(|_| CryptoError::Open)?;

    if plain.len() != KEY_SIZE {
        plain.zeroize();
        return Err(CryptoError::Open);
    }
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plain);
    plain.zeroize();
    Ok(FileMasterKey::from_bytes(bytes))
}

/// Expand a per-file master key via SHAKE-256 into 64 bytes: the filename
/// key (first 32) and the file-data key (last 32).
pub fn stretch_file_key(file_key: &FileMasterKey) -> (FilenameKey, FileDataKey) {
    let mut hasher = Shake256::default();
    hasher.update(file_key.as_bytes());
    let mut xof = hasher.finalize_xof();

    let mut okm = [0u8; 2 * KEY_SIZE];
    xof.read(&mut okm);

    let mut name_bytes = [0u8; KEY_SIZE];
    name_bytes.copy_from_slice(&okm[..KEY_SIZE]);
    let mut data_bytes = [0u8; KEY_SIZE];
    data_bytes.copy_from_slice(&okm[KEY_SIZE..]);
    okm.zeroize();

    (
        FilenameKey::from_bytes(name_bytes),
        FileDataKey::from_bytes(data_bytes),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_master_key() -> MasterKey {
        MasterKey::from_bytes([42u8; KEY_SIZE])
    }

    #[test]
    fn file_keys_are_random() {
        let k1 = generate_file_master_key();
        let k2 = generate_file_master_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let master = test_master_key();
        let file_key = generate_file_master_key();

        let wrapped = wrap_file_key(&master, 1, &file_key).unwrap();
        let unwrapped = unwrap_file_key(&master, 1, &wrapped).unwrap();

        assert_eq!(file_key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn unwrap_with_wrong_master_fails() {
        let master1 = MasterKey::from_bytes([1u8; KEY_SIZE]);
        let master2 = MasterKey::from_bytes([2u8; KEY_SIZE]);
        let file_key = generate_file_master_key();

        let wrapped = wrap_file_key(&master1, 1, &file_key).unwrap();
        assert!(unwrap_file_key(&master2, 1, &wrapped).is_err());
    }

    #[test]
    fn unwrap_with_wrong_id_fails() {
        let master = test_master_key();
        let file_key = generate_file_master_key();

        let wrapped = wrap_file_key(&master, 1, &file_key).unwrap();
        assert!(unwrap_file_key(&master, 2, &wrapped).is_err());
    }

    #[test]
    fn unwrap_tampered_record_fails() {
        let master = test_master_key();
        let file_key = generate_file_master_key();

        let mut wrapped = wrap_file_key(&master, 1, &file_key).unwrap();
        wrapped[5] ^= 0xFF;
        assert!(unwrap_file_key(&master, 1, &wrapped).is_err());
    }

    #[test]
    fn stretch_splits_into_distinct_keys() {
        let file_key = generate_file_master_key();
        let (name_key, data_key) = stretch_file_key(&file_key);
        assert_ne!(name_key.as_bytes(), data_key.as_bytes());

        // Same input, same expansion.
        let (name_key2, data_key2) = stretch_file_key(&file_key);
        assert_eq!(name_key.as_bytes(), name_key2.as_bytes());
        assert_eq!(data_key.as_bytes(), data_key2.as_bytes());
    }
}
