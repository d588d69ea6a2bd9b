use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};
use thiserror::Error;

use crate::endpoints::{RegistryError, UploadError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("unknown upload endpoint: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Legacy outcomes keep answering 200 so existing clients parse the body
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upload(
                UploadError::Transport(_) | UploadError::EmptyFileName | UploadError::Duplicate { .. },
            ) => StatusCode::OK,
            ApiError::Upload(UploadError::InvalidFileName(_)) => StatusCode::BAD_REQUEST,
            ApiError::Upload(UploadError::Decode(_) | UploadError::Storage(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Upload(e) => e.code(),
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Text shown to the uploading client
    pub fn body(&self) -> String {
        match self {
            ApiError::Upload(UploadError::Transport(code)) => {
                format!("Return Code: {}<br />\n", code)
            }
            ApiError::Upload(UploadError::EmptyFileName) => String::new(),
            ApiError::Upload(UploadError::Duplicate { file_name, .. }) => {
                format!("{} already exists. ", file_name)
            }
            ApiError::Upload(UploadError::InvalidFileName(e)) => {
                format!("Invalid file name: {}<br />\n", e)
            }
            // Paths and tool output stay in the logs
            ApiError::Upload(UploadError::Decode(_) | UploadError::Storage(_)) | ApiError::Internal(_) => {
                "Upload could not be processed<br />\n".to_string()
            }
            ApiError::NotFound(name) => format!("Unknown upload endpoint: {}<br />\n", name),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Html(self.body())).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NotFound(name) => ApiError::NotFound(name),
        }
    }
}
