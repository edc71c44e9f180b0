//! Stowage command line tool
//!
//! Thin front end over the `stowage` library. The backend is configured
//! from the environment (a `.env` file is honoured) and can be overridden
//! with flags:
//!
//!   stowage put ./report.pdf --folder invoices
//!   stowage get invoices/report.pdf --output /tmp/report.pdf
//!   stowage --backend memory ls
//!
//! Logs go to stderr, controlled by `RUST_LOG` (default `stowage=info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stowage::{BackendKind, Storage, StorageConfig};
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod error;

use error::Result;

/// Store, fetch and list files on a configurable storage backend
#[derive(Parser, Debug)]
#[command(name = "stowage", version)]
#[command(about = "Pluggable file storage from the command line")]
struct Args {
    /// Backend to use (filesystem, memory, s3); overrides STOWAGE_BACKEND
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Storage root; overrides STOWAGE_ROOT
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Prefix for public URLs; overrides STOWAGE_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file or a piece of text
    Put {
        /// Local file to upload
        #[arg(required_unless_present = "text", conflicts_with = "text")]
        source: Option<PathBuf>,

        /// Store this text instead of a file
        #[arg(long)]
        text: Option<String>,

        /// Name to store under; defaults to the source file name
        #[arg(long)]
        name: Option<String>,

        /// Folder to store into
        #[arg(long)]
        folder: Option<String>,
    },

    /// Download a stored file to stdout or a local path
    Get {
        name: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Start reading at this byte offset
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Read at most this many bytes
        #[arg(long)]
        length: Option<usize>,
    },

    /// List folders and files in a folder (the root by default)
    Ls {
        folder: Option<String>,

        /// Only list folders
        #[arg(long, conflicts_with = "files")]
        folders: bool,

        /// Only list files
        #[arg(long)]
        files: bool,
    },

    /// Delete a stored file
    Rm { name: String },

    /// Delete a folder with everything in it
    Rmdir { name: String },

    /// Create a folder
    Mkdir { name: String },

    /// Print the public URL of a stored file
    Url { name: String },

    /// Print the local path of a stored file (filesystem backend only)
    Path { name: String },

    /// Print size and modification time as JSON
    Stat { name: String },

    /// Exit with status 0 if the name exists, 1 otherwise
    Exists { name: String },
}

impl Args {
    fn storage_config(&self) -> Result<StorageConfig> {
        let mut config = StorageConfig::from_env()?;
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        Ok(config)
    }
}

async fn run(args: Args) -> Result<i32> {
    let config = args.storage_config()?;
    debug!(backend = %config.backend, root = %config.root.display(), "Building storage");
    let storage: Storage = config.build()?;

    match args.command {
        Command::Put {
            source,
            text,
            name,
            folder,
        } => commands::put(&storage, source, text, name, folder.as_deref()).await?,
        Command::Get {
            name,
            output,
            offset,
            length,
        } => commands::get(&storage, &name, output, offset, length).await?,
        Command::Ls {
            folder,
            folders,
            files,
        } => commands::list(&storage, folder.as_deref(), !files, !folders).await?,
        Command::Rm { name } => storage.delete(&name).await?,
        Command::Rmdir { name } => storage.delete_folder(&name).await?,
        Command::Mkdir { name } => storage.create_folder(&name).await?,
        Command::Url { name } => println!("{}", storage.url(&name)?),
        Command::Path { name } => println!("{}", storage.path(&name)?.display()),
        Command::Stat { name } => commands::stat(&storage, &name).await?,
        Command::Exists { name } => {
            if !storage.exists(&name).await? {
                return Ok(1);
            }
        }
    }
    Ok(0)
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stowage=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}
