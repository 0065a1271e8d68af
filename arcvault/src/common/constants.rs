/// Default size, in bytes, of one stored data block.
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// Length of every symmetric key in the hierarchy.
pub const KEY_SIZE: usize = 32;

/// ChaCha20-Poly1305 nonce length.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag length.
pub const TAG_SIZE: usize = 16;

/// PKCS#7 pad block for sealed file names.
///
/// A full pad block is appended even when the name is already aligned, so
/// the pad length is always in `1..=FILENAME_PAD_BLOCK`.
pub const FILENAME_PAD_BLOCK: usize = 100;

/// Plaintext frame size of the streaming encryption layer.
pub const STREAM_FRAME_SIZE: usize = 8 * 1024;
