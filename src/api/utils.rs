//! Multipart helpers for the upload route
//!
//! Everything that can go wrong while receiving the form is folded into a
//! [`TransportErrorCode`] so the endpoint handler sees one request shape.

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::endpoints::TransportErrorCode;

/// Form field carrying the uploaded file
pub const FILE_FIELD: &str = "file";

/// Room for boundaries and part headers on top of the file itself
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// What arrived in the `file` field
#[derive(Debug)]
pub enum FilePart {
    Received { file_name: String, content: Bytes },
    Failed { file_name: String, code: TransportErrorCode },
}

/// Map a multipart stream failure to its transport code
pub fn transport_code(err: &MultipartError) -> TransportErrorCode {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        TransportErrorCode::TooLarge
    } else {
        TransportErrorCode::Partial
    }
}

/// Validates that the file does not exceed the configured limit
pub fn validate_upload_size(len: usize, max_size: usize) -> Result<(), TransportErrorCode> {
    if len > max_size {
        return Err(TransportErrorCode::TooLarge);
    }
    Ok(())
}

/// Read the `file` field into memory, skipping any other fields
pub async fn read_file_field(multipart: &mut Multipart, max_size: usize) -> FilePart {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return FilePart::Failed {
                    file_name: String::new(),
                    code: TransportErrorCode::NoFile,
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed multipart stream");
                return FilePart::Failed {
                    file_name: String::new(),
                    code: transport_code(&e),
                };
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = match field.bytes().await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file_name = %file_name, error = %e, "Upload stream broken");
                return FilePart::Failed {
                    code: transport_code(&e),
                    file_name,
                };
            }
        };

        if let Err(code) = validate_upload_size(content.len(), max_size) {
            return FilePart::Failed { file_name, code };
        }

        return FilePart::Received { file_name, content };
    }
}
