use std::error::Error;
use std::path::{Path, PathBuf};

use arcvault::archive::{BuilderOptions, ContainerBuilder};

pub fn run(
    folder: &Path,
    output: Option<PathBuf>,
    level: i32,
    block_size: usize,
    encrypt: bool,
) -> Result<(), Box<dyn Error>> {
    if !folder.is_dir() {
        return Err(format!("{} is not a folder", folder.display()).into());
    }
    let output = output.unwrap_or_else(|| default_archive_path(folder));

    let password = if encrypt {
        let pass = rpassword::prompt_password("Password for the new container: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if pass != confirm {
            return Err("Passwords do not match.".into());
        }
        Some(pass)
    } else {
        None
    };

    let options = BuilderOptions {
        block_size,
        compression_level: level,
        password,
    };
    let mut builder = ContainerBuilder::create(&output, options)?;
    builder.insert_dir(folder)?;
    builder.close()?;

    println!("Packed {} into {}", folder.display(), output.display());
    Ok(())
}

fn default_archive_path(folder: &Path) -> PathBuf {
    let stem = folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    PathBuf::from(format!("{stem}.arc"))
}
