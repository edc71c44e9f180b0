//! Subcommands that need more than a single facade call

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use futures_util::TryStreamExt;
use serde_json::json;
use stowage::{Content, Storage};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{CliError, Result};

pub async fn put(
    storage: &Storage,
    source: Option<PathBuf>,
    text: Option<String>,
    name: Option<String>,
    folder: Option<&str>,
) -> Result<()> {
    let (content, default_name) = match (source, text) {
        (Some(path), None) => {
            let file = tokio::fs::File::open(&path).await?;
            (Content::stream(file), file_name(&path))
        }
        (None, Some(text)) => (Content::text(text), None),
        _ => {
            return Err(CliError::InvalidInput(
                "give either a source file or --text".to_string(),
            ));
        }
    };

    let name = name.or(default_name).ok_or_else(|| {
        CliError::InvalidInput("--name is required when storing text".to_string())
    })?;

    let stored = storage.save(&name, content, folder).await?;
    println!("{}", stored);
    Ok(())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

pub async fn get(
    storage: &Storage,
    name: &str,
    output: Option<PathBuf>,
    offset: u64,
    length: Option<usize>,
) -> Result<()> {
    let mut file = storage.open(name).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    let data = file.read(length).await?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, &data).await?;
            info!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

/// Folders are printed with a trailing `/`
pub async fn list(
    storage: &Storage,
    folder: Option<&str>,
    show_folders: bool,
    show_files: bool,
) -> Result<()> {
    let folder = folder.unwrap_or("");

    if show_folders {
        let folders: Vec<String> = storage.list_folders_in(folder).await?.try_collect().await?;
        for name in folders {
            println!("{}/", name);
        }
    }
    if show_files {
        let files: Vec<String> = storage.list_files_in(folder).await?.try_collect().await?;
        for name in files {
            println!("{}", name);
        }
    }
    Ok(())
}

pub async fn stat(storage: &Storage, name: &str) -> Result<()> {
    let metadata = storage.metadata(name).await?;
    let report = json!({
        "name": name,
        "metadata": metadata,
        "url": storage.url(name).ok(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
