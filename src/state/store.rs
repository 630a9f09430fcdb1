use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Store, STORE_VERSION};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is malformed: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to replace state file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The store's location on disk.
#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store. `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<Store>, StoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut store: Store = serde_json::from_slice(&data).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        if store.version == 0 {
            store.version = STORE_VERSION;
        }
        Ok(Some(store))
    }

    /// Read the store, treating a missing or unreadable file as empty.
    pub fn load_or_default(&self) -> Store {
        match self.load() {
            Ok(Some(store)) => store,
            Ok(None) => {
                debug!("No state file at {}, starting empty", self.path.display());
                Store::new()
            }
            Err(e) => {
                warn!("Discarding unreadable state: {}", e);
                Store::new()
            }
        }
    }

    /// Write the store atomically: temp file in the same directory, flush,
    /// fsync, then rename over the destination.
    pub fn save(&self, store: &Store) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut content = serde_json::to_string_pretty(store).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        content.push('\n');

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;

        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}
