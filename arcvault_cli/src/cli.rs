use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack the files of a folder into a new container
    //  将一个文件夹中的文件打包到一个新容器中
    Pack {
        /// The folder whose files will be added (subdirectories are skipped)
        //  要添加其文件的文件夹 (子目录会被跳过)
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,

        /// Output container path; defaults to "<folder>.arc"
        //  输出容器路径；默认为 "<folder>.arc"
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// zstd compression level (0 disables compression)
        //  zstd 压缩级别 (0 表示不压缩)
        #[arg(short = 'l', long = "level", default_value_t = 0)]
        level: i32,

        /// Block size in bytes
        //  块大小 (字节)
        #[arg(short = 'b', long = "block-size", default_value_t = arcvault::common::constants::DEFAULT_BLOCK_SIZE)]
        block_size: usize,

        /// Encrypt every file; prompts for a password
        //  加密每个文件；会提示输入密码
        #[arg(short = 'e', long = "encrypt")]
        encrypt: bool,
    },

    /// List the files stored in a container
    //  列出容器中存储的文件
    #[command(visible_alias = "ls")]
    List {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Prompt for the container password to reveal encrypted names
        //  提示输入容器密码以显示加密的文件名
        #[arg(short = 'p', long = "password")]
        password: bool,
    },

    /// Extract every file of a container into a directory
    //  将容器中的每个文件提取到一个目录中
    #[command(visible_alias = "get")]
    Extract {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        #[arg(value_name = "DESTINATION")]
        destination: PathBuf,

        /// Prompt for the container password
        //  提示输入容器密码
        #[arg(short = 'p', long = "password")]
        password: bool,
    },
}
