//! Container reader: header enumeration, password verification, and
//! streaming reassembly of file bodies.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::archive::header::FileEntry;
use crate::archive::pipeline::FileSource;
use crate::crypto::filename;
use crate::crypto::kdf::{self, KdfParams};
use crate::crypto::keys::{self, FileMasterKey, MasterKey};
use crate::crypto::CryptoError;
use crate::store::block::BlockReader;
use crate::store::schema::{self, StoreError};

const SELECT_KDF_PARAMS: &str = "SELECT params FROM encryption_key_params";

const SELECT_ANY_FILE_KEY: &str = "SELECT id, key FROM encryption_metadata LIMIT 1";

const SELECT_FILE_KEY: &str = "SELECT key FROM encryption_metadata WHERE id = ?1";

const SELECT_METADATA: &str = "SELECT id, name, size, blocks, mod_time, compressed, encrypted FROM metadata";

const SELECT_FILE_OPTIONS: &str = "SELECT blocks, compressed, encrypted FROM metadata WHERE id = ?1";

/// Defines errors raised while reading a container.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The reader was closed; no further operations are possible.
    #[error("reader is closed")]
    Closed,

    /// A previous operation failed and the reader refuses further work.
    #[error("reader unusable after an earlier error: {0}")]
    Poisoned(String),

    /// An encrypted file was opened but no password was supplied.
    #[error("password required to read an encrypted file")]
    PasswordRequired,

    /// A password was supplied but the container carries no encryption
    /// parameters.
    #[error("container is not encrypted but a password was supplied")]
    NotEncrypted,

    /// Password verification against a stored file key failed.
    #[error("wrong password for this container")]
    WrongPassword,

    /// `read` was called before `open_file`.
    #[error("no file is open; call open_file first")]
    NoFileSelected,

    /// No metadata row exists for the requested id.
    #[error("no file with id {0} in this container")]
    FileNotFound(i64),

    #[error("container store error: {0}")]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cryptography error: {0}")]
    Crypto(#[from] CryptoError),
}

enum ReaderState {
    Open,
    Closed,
    Poisoned(String),
}

/// Reads files back out of a container. Opening the container verifies
/// the password eagerly (by test-unwrapping a stored file key); opening a
/// file assembles the read-side filter stack from its stored flags.
///
/// Errors are sticky, with one exception: end of stream on the current
/// file is not latched, and another file may be opened afterwards.
pub struct ArchiveReader {
    conn: Rc<Connection>,
    master_key: Option<MasterKey>,
    current: Option<FileSource>,
    state: ReaderState,
}

impl ArchiveReader {
    /// Open the container at `path`.
    ///
    /// Without a password, an encrypted container is still listable, but
    /// encrypted names stay opaque and encrypted bodies cannot be opened.
    /// Supplying a password to an unencrypted container is an error.
    pub fn open(path: &Path, password: Option<&str>) -> Result<Self, ReadError> {
        let conn = schema::open_container(path)?;

        let params_blob: Option<Vec<u8>> = conn
            .query_row(SELECT_KDF_PARAMS, [], |row| row.get(0))
            .optional()?;

        let master_key = match (params_blob, password) {
            (None, Some(_)) => return Err(ReadError::NotEncrypted),
            (None, None) | (Some(_), None) => None,
            (Some(blob), Some(password)) => {
                let params = KdfParams::from_blob(&blob)?;
                let key = kdf::derive_master_key(password.as_bytes(), &params)?;
                verify_password(&conn, &key)?;
                Some(key)
            }
        };

        Ok(ArchiveReader {
            conn: Rc::new(conn),
            master_key,
            current: None,
            state: ReaderState::Open,
        })
    }

    fn check_open(&self) -> Result<(), ReadError> {
        match &self.state {
            ReaderState::Open => Ok(()),
            ReaderState::Closed => Err(ReadError::Closed),
            ReaderState::Poisoned(message) => Err(ReadError::Poisoned(message.clone())),
        }
    }

    fn guard<T>(&mut self, result: Result<T, ReadError>) -> Result<T, ReadError> {
        if let Err(err) = &result {
            self.state = ReaderState::Poisoned(err.to_string());
        }
        result
    }

    /// Enumerate the container, keyed by plaintext name when the master
    /// key is available and by the stored base64 name otherwise.
    pub fn files(&mut self) -> Result<BTreeMap<String, FileEntry>, ReadError> {
        self.check_open()?;
        let result = self.files_inner();
        self.guard(result)
    }

    fn files_inner(&self) -> Result<BTreeMap<String, FileEntry>, ReadError> {
        let mut stmt = self.conn.prepare_cached(SELECT_METADATA)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?;

        let mut files = BTreeMap::new();
        for row in rows {
            let (id, stored_name, size, blocks, mod_time, compressed, encrypted) = row?;

            let name = if encrypted {
                match &self.master_key {
                    Some(master) => {
                        let file_key = self.file_key(id, master)?;
                        let (name_key, _) = keys::stretch_file_key(&file_key);
                        filename::decrypt_filename(&name_key, &stored_name)?
                    }
                    None => stored_name,
                }
            } else {
                stored_name
            };

            files.insert(
                name.clone(),
                FileEntry {
                    id,
                    name,
                    size: size as u64,
                    blocks: blocks as u64,
                    mod_time: DateTime::from_timestamp(mod_time, 0)
                        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                    compressed,
                    encrypted,
                },
            );
        }
        Ok(files)
    }

    fn file_key(&self, id: i64, master: &MasterKey) -> Result<FileMasterKey, ReadError> {
        let wrapped: Option<Vec<u8>> = self
            .conn
            .query_row(SELECT_FILE_KEY, params![id], |row| row.get(0))
            .optional()?;
        let wrapped = wrapped.ok_or(ReadError::FileNotFound(id))?;
        Ok(keys::unwrap_file_key(master, id, &wrapped)?)
    }

    /// Select the file with `id` for reading, assembling the filter stack
    /// from its stored compression and encryption flags.
    pub fn open_file(&mut self, id: i64, transactional: bool) -> Result<(), ReadError> {
        self.check_open()?;
        let result = self.open_file_inner(id, transactional);
        self.guard(result)
    }

    fn open_file_inner(&mut self, id: i64, transactional: bool) -> Result<(), ReadError> {
        // Release any previous cursor (and its transaction) first.
        self.current = None;

        let row: Option<(i64, bool, bool)> = self
            .conn
            .query_row(SELECT_FILE_OPTIONS, params![id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()?;
        let (blocks, compressed, encrypted) = row.ok_or(ReadError::FileNotFound(id))?;

        let data_key = if encrypted {
            let master = self.master_key.as_ref().ok_or(ReadError::PasswordRequired)?;
            let file_key = self.file_key(id, master)?;
            let (_, data_key) = keys::stretch_file_key(&file_key);
            Some(data_key)
        } else {
            None
        };

        if transactional {
            self.conn.execute_batch("BEGIN")?;
        }
        let block = BlockReader::new(Rc::clone(&self.conn), id, blocks, transactional);
        self.current = Some(FileSource::build(block, data_key.as_ref(), compressed)?);
        Ok(())
    }

    /// Read from the currently selected file. `Ok(0)` signals end of
    /// stream and is not latched.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        self.check_open()?;
        let result = match self.current.as_mut() {
            Some(source) => source.read(buf).map_err(ReadError::Io),
            None => Err(ReadError::NoFileSelected),
        };
        self.guard(result)
    }

    /// Stream the file with `id` into a newly created file at `path`.
    pub fn read_to_file(&mut self, id: i64, path: &Path) -> Result<(), ReadError> {
        self.check_open()?;
        let result = self.read_to_file_inner(id, path);
        self.guard(result)
    }

    fn read_to_file_inner(&mut self, id: i64, path: &Path) -> Result<(), ReadError> {
        self.open_file_inner(id, false)?;
        let mut source = self.current.take().ok_or(ReadError::NoFileSelected)?;

        let mut dest = File::create(path)?;
        io::copy(&mut source, &mut dest)?;
        Ok(())
    }

    /// Close the reader. Every later call fails with [`ReadError::Closed`].
    pub fn close(&mut self) {
        self.current = None;
        self.state = ReaderState::Closed;
    }
}

/// Verify the derived master key by test-unwrapping any stored file key.
/// A container with encryption parameters but no encrypted files yet has
/// nothing to check against.
fn verify_password(conn: &Connection, master: &MasterKey) -> Result<(), ReadError> {
    let row: Option<(i64, Vec<u8>)> = conn
        .query_row(SELECT_ANY_FILE_KEY, [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?;

    if let Some((id, wrapped)) = row {
        keys::unwrap_file_key(master, id, &wrapped).map_err(|_| ReadError::WrongPassword)?;
    }
    Ok(())
}
