// src/fetch/zips.rs
use anyhow::Result;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

/// Download `url_str` into `dest_dir`, keeping the original filename.
/// Returns the full path of the saved file.
pub async fn download(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let url = Url::parse(url_str)?;
    let filename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.bin")
        .to_string();
    let dest_path = dest_dir.as_ref().join(filename);
    download_to(client, url_str, &dest_path).await?;
    Ok(dest_path)
}

/// Download `url_str` to an explicit destination path, creating parent
/// directories as needed.
pub async fn download_to(client: &Client, url_str: &str, dest_path: &Path) -> Result<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let resp = client.get(url_str).send().await?.error_for_status()?;
    let bytes = resp.bytes().await?;
    fs::write(dest_path, &bytes).await?;
    Ok(())
}
