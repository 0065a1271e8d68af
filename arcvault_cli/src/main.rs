use std::error::Error;
use std::process;

use clap::Parser;

mod cli;
mod handlers;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result: Result<(), Box<dyn Error>> = match cli.command {
        Commands::Pack {
            folder,
            output,
            level,
            block_size,
            encrypt,
        } => handlers::pack::run(&folder, output, level, block_size, encrypt),
        Commands::List { archive, password } => handlers::list::run(&archive, password),
        Commands::Extract {
            archive,
            destination,
            password,
        } => handlers::extract::run(&archive, &destination, password),
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
