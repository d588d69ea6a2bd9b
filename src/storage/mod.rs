//! Local disk storage for uploaded artifacts
//!
//! Layout: `<root>/<YYYYMM>/<file_name>_<client_addr>[.uu|.gz]`

mod sanitize;

pub use sanitize::{FileNameError, MAX_FILE_NAME_BYTES, validate_file_name};

use std::ffi::OsString;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::clock::month_dir_name;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(unix)]
const MONTH_DIR_MODE: u32 = 0o750;

/// One upload on disk, in any of its encoded, compressed or decoded forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    final_path: PathBuf,
    decode: bool,
}

impl StoredArtifact {
    pub fn new(final_path: PathBuf, decode: bool) -> Self {
        Self { final_path, decode }
    }

    /// Decoded form; its presence marks the upload as a duplicate
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn encoded_path(&self) -> PathBuf {
        with_suffix(&self.final_path, ".uu")
    }

    pub fn compressed_path(&self) -> PathBuf {
        with_suffix(&self.final_path, ".gz")
    }

    /// Where the raw upload is written
    pub fn landing_path(&self) -> PathBuf {
        if self.decode {
            self.encoded_path()
        } else {
            self.final_path.clone()
        }
    }

    pub fn needs_decode(&self) -> bool {
        self.decode
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Artifact store rooted at one endpoint's storage directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn month_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(month_dir_name(date))
    }

    /// Create `<root>/<YYYYMM>` if absent (owner rwx, group rx)
    pub async fn ensure_month_dir(&self, date: NaiveDate) -> Result<PathBuf> {
        let dir = self.month_dir(date);

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(MONTH_DIR_MODE);

        builder.create(&dir).await.map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;

        Ok(dir)
    }

    /// Build the artifact for an upload; `file_name` must already be validated
    pub fn artifact(
        &self,
        month_dir: &Path,
        file_name: &str,
        client_addr: IpAddr,
        append_client_addr: bool,
        decode: bool,
    ) -> StoredArtifact {
        let stem = if append_client_addr {
            format!("{file_name}_{client_addr}")
        } else {
            file_name.to_string()
        };

        StoredArtifact::new(month_dir.join(stem), decode)
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write `data` to a file that must not exist yet
    pub async fn write_new(&self, path: &Path, data: &[u8]) -> Result<()> {
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(path.to_path_buf()));
            }
            Err(e) => return Err(io_err(e)),
        };

        file.write_all(data).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;

        tracing::debug!(path = %path.display(), size = data.len(), "Artifact written");
        Ok(())
    }

    /// Remove `path` when it was last modified at least `max_age` ago
    ///
    /// Returns whether a file was removed.
    pub async fn remove_stale(&self, path: &Path, max_age: Duration) -> Result<bool> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        // Unreadable or future mtimes count as brand new
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or_default();
        if age < max_age {
            return Ok(false);
        }

        self.remove_if_exists(path).await?;
        Ok(true)
    }

    /// Remove a file, treating "not found" as success
    pub async fn remove_if_exists(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
