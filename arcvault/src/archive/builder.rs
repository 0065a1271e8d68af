//! Convenience wrapper that fills a container from a directory.

use std::fs;
use std::path::Path;

use crate::archive::header::FileHeader;
use crate::archive::writer::{ArchiveWriter, WriteError};
use crate::common::constants::DEFAULT_BLOCK_SIZE;

/// Container-wide defaults applied to every inserted file.
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    pub block_size: usize,
    /// zstd level for every file; 0 disables compression.
    pub compression_level: i32,
    /// When set, every file is encrypted under this password.
    pub password: Option<String>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            block_size: DEFAULT_BLOCK_SIZE,
            compression_level: 0,
            password: None,
        }
    }
}

/// Extends [`ArchiveWriter`] with a simpler way to pack whole files and
/// directories into a container.
pub struct ContainerBuilder {
    writer: ArchiveWriter,
    compression_level: i32,
    encrypt: bool,
}

impl ContainerBuilder {
    /// Create a container at `path` with the given defaults.
    pub fn create(path: &Path, options: BuilderOptions) -> Result<Self, WriteError> {
        let encrypt = options.password.is_some();
        let writer =
            ArchiveWriter::create(path, options.block_size, options.password.as_deref())?;
        Ok(ContainerBuilder {
            writer,
            compression_level: options.compression_level,
            encrypt,
        })
    }

    /// Store one file under its base name, in a single transaction.
    pub fn insert_file(&mut self, path: &Path) -> Result<(), WriteError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(WriteError::NoFilename)?;

        let header = FileHeader::new(name)
            .compression_level(self.compression_level)
            .encrypted(self.encrypt);
        self.writer.write_file(&header, path)
    }

    /// Store every regular file of one directory level; subdirectories
    /// are skipped, unreadable entries are reported and skipped.
    pub fn insert_dir(&mut self, dir: &Path) -> Result<(), WriteError> {
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    eprintln!("not adding entry in {}: {}", dir.display(), err);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            self.insert_file(&path)?;
        }
        Ok(())
    }

    /// Flush the container and close it.
    pub fn close(mut self) -> Result<(), WriteError> {
        self.writer.close()
    }
}
