//! Container schema and connection helpers.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

/// DDL executed once when a container is created.
///
/// `data` and `encryption_metadata` cascade with their metadata row;
/// `encryption_key_params` holds at most one row for the whole container.
pub const CONTAINER_DDL: &str = "\
CREATE TABLE metadata (
    id          INTEGER PRIMARY KEY,
    name        TEXT UNIQUE NOT NULL,
    size        INTEGER NOT NULL,
    blocks      INTEGER NOT NULL,
    mod_time    INTEGER NOT NULL,
    compressed  INTEGER NOT NULL,
    encrypted   INTEGER NOT NULL
);
CREATE TABLE data (
    id          INTEGER,
    block_id    INTEGER,
    data        BLOB NOT NULL,
    PRIMARY KEY (id, block_id),
    FOREIGN KEY (id) REFERENCES metadata(id) ON DELETE CASCADE
);
CREATE TABLE encryption_metadata (
    id          INTEGER PRIMARY KEY,
    key         BLOB UNIQUE NOT NULL,
    FOREIGN KEY (id) REFERENCES metadata(id) ON DELETE CASCADE
);
CREATE TABLE encryption_key_params (
    params      BLOB PRIMARY KEY
);
";

/// Defines errors raised while opening or creating the container file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to replace existing container file: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no container found at {0}")]
    NotFound(PathBuf),
}

/// Create a fresh container database at `path`, removing any existing
/// file first. The container is not incrementally updatable.
pub fn create_container(path: &Path) -> Result<Connection, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(StoreError::Io(err)),
    }

    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(CONTAINER_DDL)?;
    Ok(conn)
}

/// Open an existing container read-only, with foreign-key enforcement on.
pub fn open_container(path: &Path) -> Result<Connection, StoreError> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}
