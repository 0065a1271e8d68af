//! Sealed file names: PKCS#7 padding, AEAD, base64.
//!
//! Names are padded to a 100-byte boundary before sealing so the stored
//! ciphertext length leaks at most a coarse bucket of the name length.
//! The nonce is fixed at all zeros; see [`crate::crypto::keys`] for why
//! that is sound here.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::common::constants::{FILENAME_PAD_BLOCK, NONCE_SIZE};
use crate::crypto::keys::FilenameKey;
use crate::crypto::CryptoError;

/// Append PKCS#7 padding up to the next multiple of the pad block. An
/// aligned input still gains one full pad block, so the pad length is
/// always in `1..=FILENAME_PAD_BLOCK`.
fn pad(mut buffer: Vec<u8>) -> Vec<u8> {
    let pad_size = FILENAME_PAD_BLOCK - buffer.len() % FILENAME_PAD_BLOCK;
    buffer.extend(std::iter::repeat(pad_size as u8).take(pad_size));
    buffer
}

/// Strip and validate PKCS#7 padding: the last byte names the pad length,
/// and that many trailing bytes must all carry the same value.
fn unpad(buffer: &[u8]) -> Result<&[u8], CryptoError> {
    let pad_size = *buffer.last().ok_or(CryptoError::Padding)? as usize;
    if pad_size == 0 || pad_size > FILENAME_PAD_BLOCK || pad_size > buffer.len() {
        return Err(CryptoError::Padding);
    }

    let (head, tail) = buffer.split_at(buffer.len() - pad_size);
    if tail.iter().any(|&b| b as usize != pad_size) {
        return Err(CryptoError::Padding);
    }
    Ok(head)
}

/// Seal a plaintext file name, returning the base64 string stored in the
/// metadata row.
pub fn encrypt_filename(key: &FilenameKey, name: &str) -> Result<String, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let padded = pad(name.as_bytes().to_vec());

    let nonce = [0u8; NONCE_SIZE];
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), padded.as_slice())
        .map_err(|_| CryptoError::Seal)?;

    Ok(BASE64_STANDARD.encode(sealed))
}

/// Open a stored base64 name back into the plaintext file name.
pub fn decrypt_filename(key: &FilenameKey, stored: &str) -> Result<String, CryptoError> {
    let sealed = BASE64_STANDARD.decode(stored)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = [0u8; NONCE_SIZE];
    let padded = cipher
        .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
        .map_err(|_| CryptoError::Open)?;

    let name = unpad(&padded)?;
    Ok(String::from_utf8(name.to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{generate_file_master_key, stretch_file_key};

    fn test_key() -> FilenameKey {
        let (name_key, _) = stretch_file_key(&generate_file_master_key());
        name_key
    }

    #[test]
    fn pad_length_is_always_one_to_block() {
        for len in 0..=(2 * FILENAME_PAD_BLOCK + 1) {
            let padded = pad(vec![b'x'; len]);
            assert_eq!(padded.len() % FILENAME_PAD_BLOCK, 0);
            let added = padded.len() - len;
            assert!((1..=FILENAME_PAD_BLOCK).contains(&added), "len {len} added {added}");
        }
    }

    #[test]
    fn aligned_input_gains_full_pad_block() {
        let padded = pad(vec![b'x'; FILENAME_PAD_BLOCK]);
        assert_eq!(padded.len(), 2 * FILENAME_PAD_BLOCK);
        assert_eq!(padded[FILENAME_PAD_BLOCK], FILENAME_PAD_BLOCK as u8);
    }

    #[test]
    fn unpad_rejects_inconsistent_tail() {
        let mut padded = pad(b"report.txt".to_vec());
        let len = padded.len();
        padded[len - 2] ^= 1;
        assert!(matches!(unpad(&padded), Err(CryptoError::Padding)));
    }

    #[test]
    fn filename_roundtrip() {
        let key = test_key();
        for name in ["a", "report.txt", "имя файла", "文件名.tar.gz", &"x".repeat(100)] {
            let stored = encrypt_filename(&key, name).unwrap();
            assert_ne!(stored, *name);
            let back = decrypt_filename(&key, &stored).unwrap();
            assert_eq!(back, *name);
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let stored = encrypt_filename(&test_key(), "secret.txt").unwrap();
        let other = test_key();
        assert!(decrypt_filename(&other, &stored).is_err());
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = test_key();
        let stored = encrypt_filename(&key, "secret.txt").unwrap();
        let mut sealed = BASE64_STANDARD.decode(&stored).unwrap();
        sealed[3] ^= 0xFF;
        let tampered = BASE64_STANDARD.encode(sealed);
        assert!(decrypt_filename(&key, &tampered).is_err());
    }
}
