//! Framed streaming encryption between the filter pipeline and the block
//! store.
//!
//! Wire format, one frame at a time:
//!
//! ```text
//! [u32 BE: ciphertext length][u8: frame tag][ciphertext]
//! ```
//!
//! Frame tag 0 marks a message frame, 1 the final frame. The tag byte is
//! authenticated as AAD, and the nonce carries the frame counter
//! (big-endian, first 8 nonce bytes), so frames cannot be reordered,
//! duplicated, or re-tagged. Every stream ends with a final-tagged frame,
//! possibly empty; input that runs out before one is rejected as
//! truncated.

use std::io::{self, Read, Write};

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::common::constants::{NONCE_SIZE, STREAM_FRAME_SIZE, TAG_SIZE};
use crate::crypto::keys::FileDataKey;

const FRAME_TAG_MESSAGE: u8 = 0;
const FRAME_TAG_FINAL: u8 = 1;
const FRAME_HEADER_SIZE: usize = 4 + 1;
const MAX_FRAME_CIPHERTEXT: usize = STREAM_FRAME_SIZE + TAG_SIZE;

fn frame_nonce(counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..8].copy_from_slice(&counter.to_be_bytes());
    nonce
}

fn crypt_error(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Write side: buffers plaintext into fixed-size frames and seals each one
/// into the inner sink. [`StreamEncryptor::finish`] seals the trailing
/// frame and hands the sink back.
pub struct StreamEncryptor<W: Write> {
    inner: W,
    cipher: ChaCha20Poly1305,
    buffer: Vec<u8>,
    counter: u64,
}

impl<W: Write> StreamEncryptor<W> {
    pub fn new(key: &FileDataKey, inner: W) -> Self {
        StreamEncryptor {
            inner,
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
            buffer: Vec::with_capacity(STREAM_FRAME_SIZE),
            counter: 0,
        }
    }

    fn emit_frame(&mut self, tag: u8) -> io::Result<()> {
        let nonce = frame_nonce(self.counter);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &self.buffer,
                    aad: &[tag],
                },
            )
            .map_err(|_| crypt_error("frame encryption failed"))?;

        self.inner.write_all(&(ciphertext.len() as u32).to_be_bytes())?;
        self.inner.write_all(&[tag])?;
        self.inner.write_all(&ciphertext)?;

        self.buffer.clear();
        self.counter += 1;
        Ok(())
    }

    /// Seal the trailing frame (empty frames are still authenticated) and
    /// return the inner sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.emit_frame(FRAME_TAG_FINAL)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for StreamEncryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let room = STREAM_FRAME_SIZE - self.buffer.len();
            let take = room.min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.buffer.len() == STREAM_FRAME_SIZE {
                self.emit_frame(FRAME_TAG_MESSAGE)?;
            }
        }
        Ok(buf.len())
    }

    // Partial frames stay buffered; only finish() may emit a short frame.
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Read side: opens one frame at a time from the inner source and serves
/// the plaintext through [`Read`]. End of stream is reached only after a
/// valid final frame.
pub struct StreamDecryptor<R: Read> {
    inner: R,
    cipher: ChaCha20Poly1305,
    buffer: Vec<u8>,
    pos: usize,
    counter: u64,
    finished: bool,
}

impl<R: Read> StreamDecryptor<R> {
    pub fn new(key: &FileDataKey, inner: R) -> Self {
        StreamDecryptor {
            inner,
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
            buffer: Vec::new(),
            pos: 0,
            counter: 0,
            finished: false,
        }
    }

    fn read_frame(&mut self) -> io::Result<()> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.inner.read_exact(&mut header).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                crypt_error("encrypted stream truncated before final frame")
            } else {
                e
            }
        })?;

        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let tag = header[4];
        if length < TAG_SIZE
            || length > MAX_FRAME_CIPHERTEXT
            || (tag != FRAME_TAG_MESSAGE && tag != FRAME_TAG_FINAL)
        {
            return Err(crypt_error("malformed encryption frame header"));
        }

        let mut ciphertext = vec![0u8; length];
        self.inner.read_exact(&mut ciphertext).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                crypt_error("encrypted stream truncated inside a frame")
            } else {
                e
            }
        })?;

        let nonce = frame_nonce(self.counter);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: &[tag],
                },
            )
            .map_err(|_| crypt_error("frame authentication failed"))?;

        self.counter += 1;
        self.buffer = plaintext;
        self.pos = 0;
        if tag == FRAME_TAG_FINAL {
            self.finished = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for StreamDecryptor<R> {
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
            if self.finished {
                return Ok(0);
            }
            self.read_frame()?;
        }
    }
}
