#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use arcvault::archive::{ArchiveReader, ArchiveWriter, FileHeader};

pub fn container_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.arc")
}

/// Write one file into a fresh container and close it.
pub fn write_single(
    path: &Path,
    block_size: usize,
    password: Option<&str>,
    header: FileHeader,
    data: &[u8],
) {
    let mut writer = ArchiveWriter::create(path, block_size, password).unwrap();
    writer.write_header(&header).unwrap();
    writer.write(data).unwrap();
    writer.close().unwrap();
}

/// Open a container and read the named file back completely.
pub fn read_back(path: &Path, password: Option<&str>, name: &str) -> Vec<u8> {
    let mut reader = ArchiveReader::open(path, password).unwrap();
    let files = reader.files().unwrap();
    let id = files
        .get(name)
        .unwrap_or_else(|| panic!("file {name:?} not found in container"))
        .id;
    read_file_by_id(&mut reader, id)
}

/// Drain the file with `id` through the reader's streaming interface.
pub fn read_file_by_id(reader: &mut ArchiveReader, id: i64) -> Vec<u8> {
    reader.open_file(id, false).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Deterministic pseudo-content for roundtrip checks.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
