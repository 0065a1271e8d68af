//! Fixed-size block persistence for file bodies.
//!
//! The write side chunks an incoming byte stream into rows of the `data`
//! table keyed by `(file id, block index)`; the read side streams them
//! back in ascending index order. Block size is a write-time setting and
//! is not recorded: readers simply concatenate.

use std::io::{self, Read, Write};
use std::rc::Rc;

use rusqlite::{params, Connection};

const INSERT_BLOCK: &str = "INSERT INTO data (id, block_id, data) VALUES (?1, ?2, ?3)";
const SELECT_BLOCK: &str = "SELECT data FROM data WHERE id = ?1 AND block_id = ?2";

fn store_error(err: rusqlite::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// Chunks a byte stream into fixed-size rows of the `data` table.
///
/// When constructed with `owns_transaction`, the writer adopts the
/// transaction already open on its connection: [`BlockWriter::commit`]
/// commits it, and any failure (or dropping the writer uncommitted) rolls
/// it back. After a failure the writer is poisoned and refuses further
/// work.
pub struct BlockWriter {
    conn: Rc<Connection>,
    id: i64,
    block_size: usize,
    buffer: Vec<u8>,
    next_block: i64,
    owns_transaction: bool,
    committed: bool,
    poisoned: bool,
}

impl BlockWriter {
    pub fn new(conn: Rc<Connection>, id: i64, block_size: usize, owns_transaction: bool) -> Self {
        BlockWriter {
            conn,
            id,
            block_size,
            buffer: Vec::with_capacity(block_size),
            next_block: 0,
            owns_transaction,
            committed: false,
            poisoned: false,
        }
    }

    pub fn file_id(&self) -> i64 {
        self.id
    }

    /// Number of blocks emitted so far.
    pub fn blocks(&self) -> i64 {
        self.next_block
    }

    fn check_usable(&self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "block writer closed by an earlier error",
            ));
        }
        Ok(())
    }

    fn emit_block(&mut self) -> io::Result<()> {
        let result = self
            .conn
            .prepare_cached(INSERT_BLOCK)
            .and_then(|mut stmt| stmt.execute(params![self.id, self.next_block, &self.buffer[..]]));

        match result {
            Ok(_) => {
                self.buffer.clear();
                self.next_block += 1;
                Ok(())
            }
            Err(err) => {
                self.poison();
                Err(store_error(err))
            }
        }
    }

    fn poison(&mut self) {
        self.poisoned = true;
        if self.owns_transaction && !self.committed {
            let _ = self.conn.execute_batch("ROLLBACK");
            self.committed = true;
        }
    }

    /// Flush the trailing partial block, if any, and return the final
    /// block count. Zero input bytes leave zero rows.
    pub fn finish(&mut self) -> io::Result<i64> {
        self.check_usable()?;
        if !self.buffer.is_empty() {
            self.emit_block()?;
        }
        Ok(self.next_block)
    }

    /// Commit the adopted transaction. The caller runs its metadata
    /// update first so the whole file commits as one unit.
    pub fn commit(&mut self) -> Result<(), rusqlite::Error> {
        if self.owns_transaction && !self.committed && !self.poisoned {
            self.conn.execute_batch("COMMIT")?;
            self.committed = true;
        }
        Ok(())
    }
}

impl Write for BlockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_usable()?;
        let mut rest = buf;
        while !rest.is_empty() {
            let room = self.block_size - self.buffer.len();
            let take = room.min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.buffer.len() == self.block_size {
                self.emit_block()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BlockWriter {
    fn drop(&mut self) {
        if self.owns_transaction && !self.committed {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

/// Streams the blocks of one file back in ascending index order, bounded
/// by the block count recorded in the metadata row. The next row is
/// fetched only when the current block is exhausted.
pub struct BlockReader {
    conn: Rc<Connection>,
    id: i64,
    next_block: i64,
    block_count: i64,
    buffer: Vec<u8>,
    pos: usize,
    owns_transaction: bool,
    released: bool,
}

impl BlockReader {
    pub fn new(conn: Rc<Connection>, id: i64, block_count: i64, owns_transaction: bool) -> Self {
        BlockReader {
            conn,
            id,
            next_block: 0,
            block_count,
            buffer: Vec::new(),
            pos: 0,
            owns_transaction,
            released: false,
        }
    }

    fn fetch_next(&mut self) -> io::Result<()> {
        let result: Result<Vec<u8>, rusqlite::Error> = self
            .conn
            .prepare_cached(SELECT_BLOCK)
            .and_then(|mut stmt| {
                stmt.query_row(params![self.id, self.next_block], |row| row.get(0))
            });

        match result {
            Ok(data) => {
                self.buffer = data;
                self.pos = 0;
                self.next_block += 1;
                Ok(())
            }
            Err(err) => {
                self.release();
                Err(store_error(err))
            }
        }
    }

    fn release(&mut self) {
        if self.owns_transaction && !self.released {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
        self.released = true;
    }
}

impl Read for BlockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.buffer.len() {
                let n = (self.buffer.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.next_block >= self.block_count {
                self.release();
                return Ok(0);
            }
            self.fetch_next()?;
        }
    }
}

impl Drop for BlockReader {
    fn drop(&mut self) {
        self.release();
    }
}
