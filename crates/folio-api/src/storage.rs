use std::path::PathBuf;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// Where uploaded document bytes live.
///
/// Locators are opaque to callers and have the form `{uuid}.{ext}`, so two
/// uploads with the same filename never collide.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` and return the new locator.
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String>;

    /// Read a blob back. `None` when nothing is stored under the locator.
    async fn read(&self, locator: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob. Removing an absent blob is not an error.
    async fn delete(&self, locator: &str) -> Result<()>;
}

/// Only locators minted by [`new_locator`] are accepted back, which keeps
/// paths inside the storage directory.
pub fn is_valid_locator(locator: &str) -> bool {
    match locator.split_once('.') {
        Some((id, ext)) => {
            id.parse::<Uuid>().is_ok()
                && !ext.is_empty()
                && ext.len() <= 16
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

pub fn new_locator(extension: &str) -> Result<String> {
    let locator = format!("{}.{}", Uuid::new_v4(), extension.to_ascii_lowercase());
    if !is_valid_locator(&locator) {
        bail!("Unsupported file extension {:?}", extension);
    }
    Ok(locator)
}

/// Flat directory of blobs on local disk, one file per locator.
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn path(&self, locator: &str) -> Result<PathBuf> {
        if !is_valid_locator(locator) {
            bail!("Invalid blob locator {:?}", locator);
        }
        Ok(self.dir.join(locator))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let locator = new_locator(extension)?;
        fs::write(self.path(&locator)?, bytes).await?;
        Ok(locator)
    }

    async fn read(&self, locator: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(locator)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, locator: &str) -> Result<()> {
        match fs::remove_file(self.path(locator)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", locator);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
