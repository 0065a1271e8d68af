pub mod filename;
pub mod kdf;
pub mod keys;
pub mod stream;

/// Defines errors raised by the key hierarchy and filename sealing.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Authenticated encryption failed.
    #[error("authenticated encryption failed")]
    Seal,

    /// Authenticated decryption failed: wrong key or corrupted data.
    #[error("authenticated decryption failed: wrong key or corrupted data")]
    Open,

    /// The filename padding check failed (corruption or wrong key).
    #[error("invalid filename padding")]
    Padding,

    /// The password-based key derivation rejected its inputs.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// The stored key-derivation parameters could not be decoded.
    #[error("malformed key-derivation parameters: {0}")]
    Params(#[from] serde_json::Error),

    /// A stored name was not valid base64.
    #[error("base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A decrypted filename was not valid UTF-8.
    #[error("decrypted filename is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
