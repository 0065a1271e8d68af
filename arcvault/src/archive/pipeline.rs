//! Per-file filter stacks: compression over encryption over block storage.
//!
//! Each layer owns the layer beneath it, so [`FileSink::finish`] tears the
//! write stack down strictly top-down (compressor flushes its last frame,
//! the encrypter seals its final frame, then the block store flushes its
//! partial block) without any close-ordering bookkeeping.

use std::io::{self, BufReader, Read, Write};

use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

use crate::crypto::keys::FileDataKey;
use crate::crypto::stream::{StreamDecryptor, StreamEncryptor};
use crate::store::block::{BlockReader, BlockWriter};

/// Write-side stack for one file. Compression sits outermost: compressing
/// ciphertext would be useless.
pub enum FileSink {
    Plain(BlockWriter),
    Encrypted(StreamEncryptor<BlockWriter>),
    Compressed(Encoder<'static, BlockWriter>),
    CompressedEncrypted(Encoder<'static, StreamEncryptor<BlockWriter>>),
}

impl FileSink {
    pub fn build(
        block: BlockWriter,
        data_key: Option<&FileDataKey>,
        compression_level: i32,
    ) -> io::Result<FileSink> {
        match (data_key, compression_level) {
            (None, 0) => Ok(FileSink::Plain(block)),
            (Some(key), 0) => Ok(FileSink::Encrypted(StreamEncryptor::new(key, block))),
            (None, level) => Ok(FileSink::Compressed(Encoder::new(block, level)?)),
            (Some(key), level) => Ok(FileSink::CompressedEncrypted(Encoder::new(
                StreamEncryptor::new(key, block),
                level,
            )?)),
        }
    }

    /// Close the stack top-down and hand back the block writer so the
    /// caller can finalize the metadata row and commit.
    pub fn finish(self) -> io::Result<BlockWriter> {
        match self {
            FileSink::Plain(block) => Ok(block),
            FileSink::Encrypted(encrypter) => encrypter.finish(),
            FileSink::Compressed(compressor) => compressor.finish(),
            FileSink::CompressedEncrypted(compressor) => compressor.finish()?.finish(),
        }
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::Plain(w) => w.write(buf),
            FileSink::Encrypted(w) => w.write(buf),
            FileSink::Compressed(w) => w.write(buf),
            FileSink::CompressedEncrypted(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileSink::Plain(w) => w.flush(),
            FileSink::Encrypted(w) => w.flush(),
            FileSink::Compressed(w) => w.flush(),
            FileSink::CompressedEncrypted(w) => w.flush(),
        }
    }
}

/// Read-side stack for one file, assembled from the flags stored in the
/// metadata row. Decompression sits outermost, mirroring the write side.
pub enum FileSource {
    Plain(BlockReader),
    Encrypted(StreamDecryptor<BlockReader>),
    Compressed(Decoder<'static, BufReader<BlockReader>>),
    CompressedEncrypted(Decoder<'static, BufReader<StreamDecryptor<BlockReader>>>),
}

impl FileSource {
    pub fn build(
        block: BlockReader,
        data_key: Option<&FileDataKey>,
        compressed: bool,
    ) -> io::Result<FileSource> {
        match (data_key, compressed) {
            (None, false) => Ok(FileSource::Plain(block)),
            (Some(key), false) => Ok(FileSource::Encrypted(StreamDecryptor::new(key, block))),
            (None, true) => Ok(FileSource::Compressed(Decoder::new(block)?)),
            (Some(key), true) => Ok(FileSource::CompressedEncrypted(Decoder::new(
                StreamDecryptor::new(key, block),
            )?)),
        }
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileSource::Plain(r) => r.read(buf),
            FileSource::Encrypted(r) => r.read(buf),
            FileSource::Compressed(r) => r.read(buf),
            FileSource::CompressedEncrypted(r) => r.read(buf),
        }
    }
}
