use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use rusqlite::Connection;
use tempfile::tempdir;

use arcvault::archive::{ArchiveReader, ArchiveWriter, FileHeader, ReadError};

mod common;

/// An encrypted file gets a key record, and its stored name is base64
/// ciphertext rather than the plaintext name.
#[test]
fn encrypted_file_key_record_and_sealed_name() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);
    common::write_single(
        &path,
        4096,
        Some("p"),
        FileHeader::new("secret.txt").encrypted(true),
        b"hello",
    );

    let conn = Connection::open(&path).unwrap();
    let (id, stored_name): (i64, String) = conn
        .query_row("SELECT id, name FROM metadata", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_ne!(stored_name, "secret.txt");
    // The stored name decodes as base64 to a padded-and-sealed blob.
    let sealed = BASE64_STANDARD.decode(&stored_name).unwrap();
    assert!(sealed.len() >= 100 + 16);

    let key_rows: i64 = conn
        .query_row(
            "SELECT count(*) FROM encryption_metadata WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(key_rows, 1);

    let params_rows: i64 = conn
        .query_row("SELECT count(*) FROM encryption_key_params", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(params_rows, 1);
}

/// files() with the password resolves the plaintext name; without it the
/// listing is keyed by the opaque stored name.
#[test]
fn listing_with_and_without_password() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);
    common::write_single(
        &path,
        4096,
        Some("p"),
        FileHeader::new("secret.txt").encrypted(true),
        b"hello",
    );

    let conn = Connection::open(&path).unwrap();
    let stored_name: String = conn
        .query_row("SELECT name FROM metadata", [], |row| row.get(0))
        .unwrap();
    drop(conn);

    let mut unlocked = ArchiveReader::open(&path, Some("p")).unwrap();
    let files = unlocked.files().unwrap();
    assert!(files.contains_key("secret.txt"));
    assert_eq!(common::read_back(&path, Some("p"), "secret.txt"), b"hello");

    let mut locked = ArchiveReader::open(&path, None).unwrap();
    let files = locked.files().unwrap();
    assert!(!files.contains_key("secret.txt"));
    assert!(files.contains_key(stored_name.as_str()));
}

/// Opening an encrypted file without a password fails; the listing keeps
/// working beforehand.
#[test]
fn encrypted_body_needs_password() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);
    common::write_single(
        &path,
        4096,
        Some("p"),
        FileHeader::new("secret.txt").encrypted(true),
        b"hello",
    );

    let mut reader = ArchiveReader::open(&path, None).unwrap();
    let files = reader.files().unwrap();
    let id = files.values().next().unwrap().id;
    assert!(matches!(
        reader.open_file(id, false),
        Err(ReadError::PasswordRequired)
    ));
}

/// Wrong password: rejected at container open, before any file data is
/// touched.
#[test]
fn wrong_password_is_rejected_at_open() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);
    common::write_single(
        &path,
        4096,
        Some("p"),
        FileHeader::new("secret.txt").encrypted(true),
        b"hello",
    );

    let result = ArchiveReader::open(&path, Some("q"));
    assert!(matches!(result, Err(ReadError::WrongPassword)));
}

/// Password against an unencrypted container: *not-encrypted*.
#[test]
fn password_on_plain_container_is_rejected() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);
    common::write_single(&path, 4096, None, FileHeader::new("a"), b"plain");

    let result = ArchiveReader::open(&path, Some("p"));
    assert!(matches!(result, Err(ReadError::NotEncrypted)));
}

/// Flipping one byte of any stored block makes the read fail.
#[test]
fn tampered_data_block_fails_to_read() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);
    let data = common::patterned(5000);
    common::write_single(
        &path,
        1024,
        Some("p"),
        FileHeader::new("secret.bin").encrypted(true),
        &data,
    );

    // Flip one ciphertext byte in the middle block.
    let conn = Connection::open(&path).unwrap();
    let (block_id, mut blob): (i64, Vec<u8>) = conn
        .query_row("SELECT block_id, data FROM data WHERE block_id = 1", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    blob[10] ^= 0xFF;
    conn.execute(
        "UPDATE data SET data = ?1 WHERE block_id = ?2",
        rusqlite::params![blob, block_id],
    )
    .unwrap();
    drop(conn);

    let mut reader = ArchiveReader::open(&path, Some("p")).unwrap();
    let files = reader.files().unwrap();
    reader.open_file(files["secret.bin"].id, false).unwrap();

    let mut out = Vec::new();
    let mut buf = [0u8; 512];
    let failed = loop {
        match reader.read(&mut buf) {
            Ok(0) => break false,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => break true,
        }
    };
    assert!(failed, "tampered block must not read back cleanly");
}

/// Flipping one byte of the sealed per-file key makes every use of that
/// file fail.
#[test]
fn tampered_key_record_fails() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);
    common::write_single(
        &path,
        4096,
        Some("p"),
        FileHeader::new("secret.txt").encrypted(true),
        b"hello",
    );

    let conn = Connection::open(&path).unwrap();
    let mut wrapped: Vec<u8> = conn
        .query_row("SELECT key FROM encryption_metadata", [], |row| row.get(0))
        .unwrap();
    wrapped[3] ^= 0xFF;
    conn.execute(
        "UPDATE encryption_metadata SET key = ?1",
        rusqlite::params![wrapped],
    )
    .unwrap();
    drop(conn);

    // The damaged key record is indistinguishable from a wrong password
    // at verification time.
    assert!(ArchiveReader::open(&path, Some("p")).is_err());
}

/// Deleting a metadata row cascades away its blocks and its key record.
#[test]
fn cascade_delete_removes_blocks_and_key() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);

    let mut writer = ArchiveWriter::create(&path, 256, Some("p")).unwrap();
    for name in ["one", "two", "three"] {
        writer
            .write_header(&FileHeader::new(name).encrypted(true))
            .unwrap();
        writer.write(&common::patterned(2000)).unwrap();
    }
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    let victim: i64 = conn
        .query_row("SELECT id FROM metadata LIMIT 1", [], |row| row.get(0))
        .unwrap();
    conn.execute("DELETE FROM metadata WHERE id = ?1", [victim])
        .unwrap();

    let data_rows: i64 = conn
        .query_row("SELECT count(*) FROM data WHERE id = ?1", [victim], |row| {
            row.get(0)
        })
        .unwrap();
    let key_rows: i64 = conn
        .query_row(
            "SELECT count(*) FROM encryption_metadata WHERE id = ?1",
            [victim],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(data_rows, 0);
    assert_eq!(key_rows, 0);

    // The two survivors are intact.
    let remaining: i64 = conn
        .query_row("SELECT count(*) FROM metadata", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 2);
}

/// Two encrypted files may share a plaintext name: the stored names are
/// distinct ciphertexts. The unlocked listing keeps one entry per key.
#[test]
fn encrypted_names_are_unique_ciphertexts() {
    let dir = tempdir().unwrap();
    let path = common::container_path(&dir);

    let mut writer = ArchiveWriter::create(&path, 4096, Some("p")).unwrap();
    writer
        .write_header(&FileHeader::new("same.txt").encrypted(true))
        .unwrap();
    writer.write(b"first").unwrap();
    writer
        .write_header(&FileHeader::new("same.txt").encrypted(true))
        .unwrap();
    writer.write(b"second").unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let distinct: i64 = conn
        .query_row("SELECT count(DISTINCT name) FROM metadata", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(distinct, 2);
}
