//! Configuration Storage
//!
//! Handles reading/writing JSON files to disk.
//! Config location: ~/.netautomate on macOS/Linux, %APPDATA%\NetAutomate on Windows

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Configuration storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Get the NetAutomate configuration directory
pub fn config_dir() -> Result<PathBuf, StorageError> {
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("NetAutomate"));
        }
        dirs::home_dir()
            .map(|home| home.join(".netautomate"))
            .ok_or(StorageError::NoConfigDir)
    }

    #[cfg(not(windows))]
    {
        dirs::home_dir()
            .map(|home| home.join(".netautomate"))
            .ok_or(StorageError::NoConfigDir)
    }
}

/// Get the default config file path
pub fn config_file() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("config.json"))
}

/// A single JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Load the document
    /// Returns the default value if the file doesn't exist.
    /// If the file is corrupted, backs it up and returns the default value.
    pub async fn load<T>(&self) -> Result<T, StorageError>
    where
        T: DeserializeOwned + Default,
    {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => match serde_json::from_str::<T>(&contents) {
                Ok(value) => Ok(value),
                Err(e) => {
                    tracing::warn!("{} corrupted: {}", self.path.display(), e);

                    match self.backup().await {
                        Ok(backup_path) => {
                            tracing::warn!(
                                "Corrupted file backed up to {:?}, using defaults",
                                backup_path
                            );
                        }
                        Err(backup_err) => {
                            tracing::error!("Failed to backup corrupted file: {}", backup_err);
                        }
                    }

                    Ok(T::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Save the document
    pub async fn save<T: Serialize>(&self, value: &T) -> Result<(), StorageError> {
        self.ensure_dir().await?;

        // Write to temp file first, then rename (atomic write)
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(value)?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Create a backup of the current file
    pub async fn backup(&self) -> Result<PathBuf, StorageError> {
        let backup_path = self.path.with_extension(format!(
            "json.backup.{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ));

        if self.exists().await {
            fs::copy(&self.path, &backup_path).await?;
        }

        Ok(backup_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = tempdir().unwrap();
        let store = JsonStore::with_path(temp.path().join("missing.json"));

        let value: BTreeMap<String, u16> = store.load().await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let store = JsonStore::with_path(temp.path().join("nested").join("ports.json"));

        let mut value = BTreeMap::new();
        value.insert("ssh".to_string(), 22u16);
        store.save(&value).await.unwrap();

        let loaded: BTreeMap<String, u16> = store.load().await.unwrap();
        assert_eq!(loaded.get("ssh"), Some(&22));
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonStore::with_path(path);

        let value: BTreeMap<String, u16> = store.load().await.unwrap();
        assert!(value.is_empty());

        let backups = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("backup"))
            .count();
        assert_eq!(backups, 1);
    }
}
