//! Allow-list check for client-supplied file names

use thiserror::Error;

pub const MAX_FILE_NAME_BYTES: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileNameError {
    #[error("file name is empty")]
    Empty,
    #[error("file name exceeds {} bytes", MAX_FILE_NAME_BYTES)]
    TooLong,
    #[error("file name must not start with '.'")]
    LeadingDot,
    #[error("file name contains disallowed character {0:?}")]
    DisallowedChar(char),
}

/// Accepts ASCII letters, digits, `.`, `-` and `_`. Names are never rewritten.
pub fn validate_file_name(name: &str) -> Result<&str, FileNameError> {
    if name.is_empty() {
        return Err(FileNameError::Empty);
    }

    if name.len() > MAX_FILE_NAME_BYTES {
        return Err(FileNameError::TooLong);
    }

    if name.starts_with('.') {
        return Err(FileNameError::LeadingDot);
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
    {
        return Err(FileNameError::DisallowedChar(c));
    }

    Ok(name)
}
