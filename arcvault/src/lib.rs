//! arcvault: a single-file archive container on SQLite.
//!
//! Many logical files are stored inside one relational database file, with
//! optional per-file zstd compression and optional per-file authenticated
//! encryption (file names included). Unlike streaming formats such as tar,
//! every member is randomly accessible, and each file is written under
//! transactional semantics: a failure mid-file rolls the whole file back.
//!
//! On the write path, user bytes flow through an optional zstd encoder,
//! then an optional framed ChaCha20-Poly1305 layer, and finally a block
//! chunker that persists fixed-size rows. The read path reassembles the
//! same stack in reverse.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use arcvault::archive::{ArchiveReader, ArchiveWriter, FileHeader};
//! use arcvault::common::constants::DEFAULT_BLOCK_SIZE;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let path = Path::new("backup.arc");
//!
//! let mut writer = ArchiveWriter::create(path, DEFAULT_BLOCK_SIZE, Some("hunter2"))?;
//! writer.write_header(&FileHeader::new("notes.txt").encrypted(true))?;
//! writer.write(b"meet at dawn")?;
//! writer.close()?;
//!
//! let mut reader = ArchiveReader::open(path, Some("hunter2"))?;
//! for (name, entry) in reader.files()? {
//!     println!("{} ({} bytes)", name, entry.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod common;
pub mod crypto;
pub mod store;
