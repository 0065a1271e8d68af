use std::error::Error;
use std::fs;
use std::path::Path;

use arcvault::archive::ArchiveReader;

use crate::handlers::maybe_prompt_password;

pub fn run(archive: &Path, destination: &Path, ask_password: bool) -> Result<(), Box<dyn Error>> {
    let password = maybe_prompt_password(ask_password)?;

    fs::create_dir_all(destination)?;

    let mut reader = ArchiveReader::open(archive, password.as_deref())?;
    let files = reader.files()?;

    for (name, entry) in &files {
        // Containers hold flat file sets; refuse anything that would
        // escape the destination directory.
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| format!("refusing to extract unusable name {name:?}"))?;
        let target = destination.join(file_name);

        println!("Extracting {}", target.display());
        reader.read_to_file(entry.id, &target)?;
    }

    println!("Extracted {} file(s).", files.len());
    Ok(())
}
