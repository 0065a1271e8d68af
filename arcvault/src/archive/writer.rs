//! Container writer: header insertion, filter assembly, byte ingestion,
//! and per-file metadata finalization.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::archive::header::FileHeader;
use crate::archive::pipeline::FileSink;
use crate::crypto::filename;
use crate::crypto::kdf::{self, KdfParams};
use crate::crypto::keys::{self, MasterKey};
use crate::crypto::CryptoError;
use crate::store::block::BlockWriter;
use crate::store::schema::{self, StoreError};

const INSERT_METADATA: &str = "INSERT INTO metadata (name, size, blocks, mod_time, compressed, encrypted)
     VALUES (?1, 0, 0, ?2, ?3, ?4)";

const UPDATE_METADATA: &str = "UPDATE metadata SET size = ?1, blocks = ?2 WHERE id = ?3";

const UPDATE_NAME: &str = "UPDATE metadata SET name = ?1 WHERE id = ?2";

const INSERT_FILE_KEY: &str = "INSERT INTO encryption_metadata (id, key) VALUES (?1, ?2)";

const INSERT_KDF_PARAMS: &str = "INSERT INTO encryption_key_params (params) VALUES (?1)";

/// Defines errors raised while writing a container.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The writer was closed; no further operations are possible.
    #[error("writer is closed")]
    Closed,

    /// A previous operation failed and the writer refuses further work.
    #[error("writer unusable after an earlier error: {0}")]
    Poisoned(String),

    /// The header carried an empty file name.
    #[error("file name cannot be empty")]
    NoFilename,

    /// Encryption was requested but the container was created without a
    /// password.
    #[error("attempt to encrypt a file in a container created without a password")]
    NoPassword,

    /// `write` was called before any `write_header`.
    #[error("no file is open; call write_header first")]
    NoOpenFile,

    /// The configured block size was zero.
    #[error("block size must be greater than zero")]
    InvalidBlockSize,

    #[error("container store error: {0}")]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cryptography error: {0}")]
    Crypto(#[from] CryptoError),
}

enum WriterState {
    Open,
    Closed,
    Poisoned(String),
}

struct OpenFile {
    id: i64,
    sink: FileSink,
    bytes_written: u64,
}

/// Writes files into a single-container database. [`ArchiveWriter::write_header`]
/// starts a new file; subsequent [`ArchiveWriter::write`] calls stream its
/// bytes through the per-file filter stack. Files are finalized when the
/// next header arrives or on [`ArchiveWriter::close`].
///
/// Errors are sticky: the first hard failure poisons the writer and every
/// later call reports it. There is no mid-file recovery.
pub struct ArchiveWriter {
    conn: Rc<Connection>,
    block_size: usize,
    master_key: Option<MasterKey>,
    current: Option<OpenFile>,
    state: WriterState,
}

impl ArchiveWriter {
    /// Create a new container at `path`, replacing any existing file.
    ///
    /// With a password, a master key is derived and the KDF parameters are
    /// stored; without one, writing an encrypted file later fails with
    /// [`WriteError::NoPassword`].
    pub fn create(
        path: &Path,
        block_size: usize,
        password: Option<&str>,
    ) -> Result<Self, WriteError> {
        if block_size == 0 {
            return Err(WriteError::InvalidBlockSize);
        }

        let conn = schema::create_container(path)?;

        let master_key = match password {
            Some(password) => {
                let params = KdfParams::generate();
                let key = kdf::derive_master_key(password.as_bytes(), &params)?;
                conn.execute(INSERT_KDF_PARAMS, params![params.to_blob()?])?;
                Some(key)
            }
            None => None,
        };

        Ok(ArchiveWriter {
            conn: Rc::new(conn),
            block_size,
            master_key,
            current: None,
            state: WriterState::Open,
        })
    }

    fn check_open(&self) -> Result<(), WriteError> {
        match &self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(WriteError::Closed),
            WriterState::Poisoned(message) => Err(WriteError::Poisoned(message.clone())),
        }
    }

    fn guard<T>(&mut self, result: Result<T, WriteError>) -> Result<T, WriteError> {
        if let Err(err) = &result {
            self.state = WriterState::Poisoned(err.to_string());
        }
        result
    }

    /// Finalize any open file and start the file described by `header`.
    pub fn write_header(&mut self, header: &FileHeader) -> Result<(), WriteError> {
        self.check_open()?;
        let result = self.write_header_inner(header);
        self.guard(result)
    }

    fn write_header_inner(&mut self, header: &FileHeader) -> Result<(), WriteError> {
        if header.name.is_empty() {
            return Err(WriteError::NoFilename);
        }
        if header.encrypted && self.master_key.is_none() {
            return Err(WriteError::NoPassword);
        }

        self.flush_current()?;

        // Begin before the metadata INSERT so the row, the key record, the
        // sealed-name update, the blocks, and the final size update are one
        // unit. The block writer owns the commit.
        if header.transactional {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        match self.begin_file(header) {
            Ok(open_file) => {
                self.current = Some(open_file);
                Ok(())
            }
            Err(err) => {
                if header.transactional {
                    let _ = self.conn.execute_batch("ROLLBACK");
                }
                Err(err)
            }
        }
    }

    fn begin_file(&mut self, header: &FileHeader) -> Result<OpenFile, WriteError> {
        let mod_time = header.mod_time.unwrap_or_else(Utc::now).timestamp();
        self.conn.execute(
            INSERT_METADATA,
            params![
                header.name,
                mod_time,
                header.compression_level != 0,
                header.encrypted
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        let data_key = if header.encrypted {
            let master = self.master_key.as_ref().ok_or(WriteError::NoPassword)?;

            let file_key = keys::generate_file_master_key();
            let wrapped = keys::wrap_file_key(master, id, &file_key)?;
            self.conn.execute(INSERT_FILE_KEY, params![id, wrapped])?;

            let (name_key, data_key) = keys::stretch_file_key(&file_key);
            let sealed_name = filename::encrypt_filename(&name_key, &header.name)?;
            self.conn.execute(UPDATE_NAME, params![sealed_name, id])?;

            Some(data_key)
        } else {
            None
        };

        let block = BlockWriter::new(
            Rc::clone(&self.conn),
            id,
            self.block_size,
            header.transactional,
        );
        let sink = FileSink::build(block, data_key.as_ref(), header.compression_level)?;

        Ok(OpenFile {
            id,
            sink,
            bytes_written: 0,
        })
    }

    /// Stream bytes into the file opened by the last `write_header`.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        self.check_open()?;
        let result = self.write_inner(buf);
        self.guard(result)
    }

    fn write_inner(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        let file = self.current.as_mut().ok_or(WriteError::NoOpenFile)?;
        file.sink.write_all(buf)?;
        file.bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    /// Store one filesystem file under `header`, always in a single
    /// transaction.
    pub fn write_file(&mut self, header: &FileHeader, path: &Path) -> Result<(), WriteError> {
        self.check_open()?;
        let result = self.write_file_inner(header, path);
        self.guard(result)
    }

    fn write_file_inner(&mut self, header: &FileHeader, path: &Path) -> Result<(), WriteError> {
        let mut header = header.clone();
        header.transactional = true;
        self.write_header_inner(&header)?;

        let mut source = File::open(path)?;
        let mut buffer = [0u8; 8192];
        loop {
            let n = source.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            self.write_inner(&buffer[..n])?;
        }

        self.flush_current()
    }

    /// Finalize the file currently being written, if any: close the filter
    /// stack top-down, record its plaintext size and block count, and
    /// commit.
    pub fn finish_file(&mut self) -> Result<(), WriteError> {
        self.check_open()?;
        let result = self.flush_current();
        self.guard(result)
    }

    fn flush_current(&mut self) -> Result<(), WriteError> {
        let Some(file) = self.current.take() else {
            return Ok(());
        };

        let mut block = file.sink.finish()?;
        let blocks = block.finish()?;
        self.conn.execute(
            UPDATE_METADATA,
            params![file.bytes_written as i64, blocks, file.id],
        )?;
        block.commit()?;
        Ok(())
    }

    /// Flush any open file and close the container. Every later call
    /// fails with [`WriteError::Closed`].
    pub fn close(&mut self) -> Result<(), WriteError> {
        self.check_open()?;
        match self.flush_current() {
            Ok(()) => {
                self.state = WriterState::Closed;
                Ok(())
            }
            Err(err) => self.guard(Err(err)),
        }
    }
}
