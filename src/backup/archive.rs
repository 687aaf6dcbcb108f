use crate::app_config::{Archive, ConfigError};
use crate::domain::DeviceId;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, instrument, warn};

const NONCE_LEN: usize = 12;

/// Source of previously stored device backups.
#[async_trait]
pub trait BackupArchive: Send + Sync {
    async fn fetch_backup(&self, device: &DeviceId) -> Result<Vec<u8>, ArchiveError>;

    fn decrypt_backup(&self, bytes: Vec<u8>) -> Result<Vec<u8>, ArchiveError>;

    fn extract_backup(&self, bytes: Vec<u8>) -> Result<String, ArchiveError>;
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Decrypt(String),
    #[error("{0}")]
    Extract(String),
}

/// Keeps backups as files under `<directory>/<device id>/`. The newest file is the latest backup.
///
/// With a key configured, files hold a 12 byte nonce followed by the AES-256-GCM ciphertext.
pub struct DirectoryArchive {
    directory: PathBuf,
    extension: String,
    key: Option<Vec<u8>>,
}

impl DirectoryArchive {
    pub fn new(config: &Archive) -> Result<Self, ConfigError> {
        let key = config.key().map(decode_key).transpose()?;

        Ok(DirectoryArchive {
            directory: config.directory().to_path_buf(),
            extension: config.extension().to_string(),
            key,
        })
    }

    async fn newest_file(&self, device: &DeviceId) -> Result<PathBuf, ArchiveError> {
        let directory = self.directory.join(device.as_str());
        let dir = fs::read_dir(&directory)
            .await
            .map_err(|e| ArchiveError::Unavailable(format!("unable to read '{}': {}", directory.display(), e)))?;
        let mut entries = ReadDirStream::new(dir);

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next().await {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("⚠️ Unable to read archive entry: {}", err);
                    continue;
                }
            };

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|metadata| metadata.modified().map(|m| (metadata.is_file(), m))) {
                Ok((true, modified)) => modified,
                Ok(_) => continue,
                Err(err) => {
                    warn!("⚠️ Unable to read metadata of '{}': {}", path.display(), err);
                    continue;
                }
            };

            if newest.as_ref().is_none_or(|current| (modified, &path) > (current.0, &current.1)) {
                newest = Some((modified, path));
            }
        }

        newest.map(|(_, path)| path).ok_or_else(|| {
            ArchiveError::Unavailable(format!("no '.{}' backup found in '{}'", self.extension, directory.display()))
        })
    }
}

impl fmt::Debug for DirectoryArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryArchive")
            .field("directory", &self.directory)
            .field("extension", &self.extension)
            .field("encrypted", &self.key.is_some())
            .finish()
    }
}

#[async_trait]
impl BackupArchive for DirectoryArchive {
    #[instrument(skip(self))]
    async fn fetch_backup(&self, device: &DeviceId) -> Result<Vec<u8>, ArchiveError> {
        let path = self.newest_file(device).await?;
        debug!(path = %path.display(), "🗄️ Reading archived backup...");

        fs::read(&path)
            .await
            .map_err(|e| ArchiveError::Unavailable(format!("unable to read '{}': {}", path.display(), e)))
    }

    fn decrypt_backup(&self, bytes: Vec<u8>) -> Result<Vec<u8>, ArchiveError> {
        let Some(key) = &self.key else {
            return Ok(bytes);
        };

        if bytes.len() < NONCE_LEN {
            return Err(ArchiveError::Decrypt("encrypted backup is too short".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| ArchiveError::Decrypt(format!("invalid key: {}", e)))?;
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ArchiveError::Decrypt("backup does not authenticate with the configured key".to_string()))
    }

    fn extract_backup(&self, bytes: Vec<u8>) -> Result<String, ArchiveError> {
        String::from_utf8(bytes).map_err(|e| ArchiveError::Extract(format!("backup is not valid UTF-8: {}", e)))
    }
}

fn decode_key(encoded: &str) -> Result<Vec<u8>, ConfigError> {
    let key = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ConfigError::InvalidArchiveKey(e.to_string()))?;

    if key.len() != 32 {
        return Err(ConfigError::InvalidArchiveKey(format!("expected 32 bytes, got {}", key.len())));
    }

    Ok(key)
}
