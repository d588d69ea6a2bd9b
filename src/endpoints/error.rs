use std::path::PathBuf;
use thiserror::Error;

use super::types::TransportErrorCode;
use crate::decode::DecodeError;
use crate::storage::{FileNameError, StorageError};

/// Ways a single upload can end without a stored artifact
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload failed with code {0}")]
    Transport(TransportErrorCode),

    #[error("upload has an empty file name")]
    EmptyFileName,

    #[error("invalid file name: {0}")]
    InvalidFileName(#[from] FileNameError),

    #[error("{file_name} already exists")]
    Duplicate { file_name: String, path: PathBuf },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl UploadError {
    /// Stable identifier for logs
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Transport(_) => "TRANSPORT_ERROR",
            UploadError::EmptyFileName => "EMPTY_FILE_NAME",
            UploadError::InvalidFileName(_) => "INVALID_FILE_NAME",
            UploadError::Duplicate { .. } => "DUPLICATE_ARTIFACT",
            UploadError::Decode(DecodeError::DecodeFailed(_)) => "DECODE_FAILED",
            UploadError::Decode(DecodeError::DecompressFailed(_)) => "DECOMPRESS_FAILED",
            UploadError::Decode(DecodeError::TargetExists(_)) => "DUPLICATE_ARTIFACT",
            UploadError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
