//! Two-stage decode of encoded uploads (uudecode, then gunzip)
//!
//! Uploads arrive as uuencoded gzip streams. [`ShellDecoder`] drives the
//! system `uudecode` and `gzip` binaries; every invocation's exit status and
//! stderr are checked, so a missing binary or a corrupt upload surfaces as a
//! [`DecodeError`] instead of a silently absent artifact.
//!
//! The final artifact is opened create-new before `gzip -dc` writes into it,
//! so a decoder never replaces a file another request already produced.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::DecodeConfig;
use crate::storage::StoredArtifact;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("decompress failed: {0}")]
    DecompressFailed(String),

    /// Another request produced the final artifact first
    #[error("decoded artifact already exists: {}", .0.display())]
    TargetExists(PathBuf),
}

/// Turns an artifact's encoded form into its final decoded form
#[async_trait]
pub trait Decoder: Send + Sync {
    /// On success the final path exists and the `.uu` and `.gz` forms are
    /// gone. An existing final artifact is never replaced; that case is
    /// reported as [`DecodeError::TargetExists`].
    async fn decode(&self, artifact: &StoredArtifact) -> Result<(), DecodeError>;
}

/// Decoder backed by external `uudecode` and `gzip` processes
#[derive(Debug, Clone)]
pub struct ShellDecoder {
    uudecode: PathBuf,
    gzip: PathBuf,
    timeout: Option<Duration>,
}

impl ShellDecoder {
    pub fn new(
        uudecode: impl Into<PathBuf>,
        gzip: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            uudecode: uudecode.into(),
            gzip: gzip.into(),
            timeout,
        }
    }

    pub fn from_config(config: &DecodeConfig) -> Self {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Self::new(&config.uudecode_path, &config.gzip_path, timeout)
    }

    async fn run(&self, program: &Path, args: &[&Path], stdout: Stdio) -> Result<(), String> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| format!("{} timed out after {:?}", program.display(), limit))?,
            None => output.await,
        }
        .map_err(|e| format!("failed to run {}: {}", program.display(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(program = %program.display(), stdout = %stdout.trim(), "Decoder output");
        }

        Ok(())
    }

    /// `gzip -dc <gz>` into a freshly created `target`
    async fn decompress(&self, compressed: &Path, target: &Path) -> Result<(), DecodeError> {
        let file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DecodeError::TargetExists(target.to_path_buf()));
            }
            Err(e) => {
                return Err(DecodeError::DecompressFailed(format!(
                    "failed to create {}: {}",
                    target.display(),
                    e
                )));
            }
        };

        let stdout = Stdio::from(file.into_std().await);
        if let Err(e) = self
            .run(&self.gzip, &[Path::new("-dc"), compressed], stdout)
            .await
        {
            // Only the file created above is ours to remove
            if let Err(rm) = tokio::fs::remove_file(target).await {
                warn!(path = %target.display(), error = %rm, "Failed to remove partial artifact");
            }
            return Err(DecodeError::DecompressFailed(e));
        }

        Ok(())
    }
}

#[async_trait]
impl Decoder for ShellDecoder {
    async fn decode(&self, artifact: &StoredArtifact) -> Result<(), DecodeError> {
        let encoded = artifact.encoded_path();
        let compressed = artifact.compressed_path();

        // uudecode -o <gz> <uu>
        self.run(
            &self.uudecode,
            &[Path::new("-o"), compressed.as_path(), encoded.as_path()],
            Stdio::piped(),
        )
        .await
        .map_err(DecodeError::DecodeFailed)?;

        self.decompress(&compressed, artifact.final_path()).await?;

        // `.uu` goes last: while it exists no other request can reuse `.gz`
        for path in [&compressed, &encoded] {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove intermediate artifact");
            }
        }

        Ok(())
    }
}
