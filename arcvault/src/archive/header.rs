use chrono::{DateTime, Utc};

/// Describes the next file to be written into a container.
#[derive(Debug, Clone)]
pub struct FileHeader {
    /// Name of the file inside the container. Must not be empty.
    pub name: String,
    /// Last modification time; `None` means "now", in UTC.
    pub mod_time: Option<DateTime<Utc>>,
    /// zstd compression level; 0 disables compression.
    pub compression_level: i32,
    /// Seal the file body and its name under the container password.
    pub encrypted: bool,
    /// Write all blocks of this file in a single transaction.
    pub transactional: bool,
}

impl FileHeader {
    pub fn new(name: impl Into<String>) -> Self {
        FileHeader {
            name: name.into(),
            mod_time: None,
            compression_level: 0,
            encrypted: false,
            transactional: false,
        }
    }

    pub fn mod_time(mut self, mod_time: DateTime<Utc>) -> Self {
        self.mod_time = Some(mod_time);
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }
}

/// One container entry as reported by
/// [`ArchiveReader::files`](crate::archive::ArchiveReader::files).
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub id: i64,
    /// Plaintext name when the container is unlocked; the stored base64
    /// ciphertext otherwise.
    pub name: String,
    /// Plaintext size in bytes, regardless of compression or encryption.
    pub size: u64,
    /// Number of stored data blocks.
    pub blocks: u64,
    pub mod_time: DateTime<Utc>,
    /// Whether the body is compressed. The original encoder level is not
    /// preserved; decompression is self-describing.
    pub compressed: bool,
    pub encrypted: bool,
}
