use std::error::Error;
use std::path::Path;

use arcvault::archive::ArchiveReader;

use crate::handlers::maybe_prompt_password;

pub fn run(archive: &Path, ask_password: bool) -> Result<(), Box<dyn Error>> {
    let password = maybe_prompt_password(ask_password)?;
    let mut reader = ArchiveReader::open(archive, password.as_deref())?;
    let files = reader.files()?;

    println!("{} file(s) in {}", files.len(), archive.display());
    if files.is_empty() {
        return Ok(());
    }

    println!(
        "{:<44} {:>12} {:<20} {:<5} {:<5}",
        "Name", "Size", "Modified", "Zstd", "Enc"
    );
    println!("{}", "-".repeat(90));
    for (name, entry) in &files {
        println!(
            "{:<44} {:>12} {:<20} {:<5} {:<5}",
            name,
            entry.size,
            entry.mod_time.format("%Y-%m-%d %H:%M:%S"),
            flag(entry.compressed),
            flag(entry.encrypted),
        );
    }
    Ok(())
}

fn flag(set: bool) -> &'static str {
    if set {
        "yes"
    } else {
        "no"
    }
}
