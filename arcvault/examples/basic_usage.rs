//! Minimal tour: create a container, store two files, read them back.

use std::error::Error;
use std::path::Path;

use arcvault::archive::{ArchiveReader, ArchiveWriter, FileHeader};
use arcvault::common::constants::DEFAULT_BLOCK_SIZE;

fn main() -> Result<(), Box<dyn Error>> {
    let path = Path::new("demo.arc");

    // --- Write side ---
    let mut writer = ArchiveWriter::create(path, DEFAULT_BLOCK_SIZE, Some("demo-password"))?;

    writer.write_header(&FileHeader::new("notes.txt").encrypted(true))?;
    writer.write(b"meet at dawn")?;

    writer.write_header(&FileHeader::new("readme.md").compression_level(3))?;
    writer.write(b"# demo\nplain but compressed\n")?;

    writer.close()?;

    // --- Read side ---
    let mut reader = ArchiveReader::open(path, Some("demo-password"))?;

    let files = reader.files()?;
    for (name, entry) in &files {
        println!("{:>6} bytes  {}", entry.size, name);
    }

    reader.open_file(files["notes.txt"].id, false)?;
    let mut contents = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        contents.extend_from_slice(&buf[..n]);
    }
    println!("notes.txt: {}", String::from_utf8_lossy(&contents));

    std::fs::remove_file(path)?;
    Ok(())
}
