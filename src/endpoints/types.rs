use bytes::Bytes;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config::EndpointConfig;

/// Why the HTTP layer could not hand over an intact file
///
/// Numbering follows the classic form-upload error codes so existing
/// clients keep seeing the numbers they already parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorCode {
    TooLarge,
    Partial,
    NoFile,
    CantWrite,
}

impl TransportErrorCode {
    pub fn code(&self) -> u8 {
        match self {
            TransportErrorCode::TooLarge => 1,
            TransportErrorCode::Partial => 3,
            TransportErrorCode::NoFile => 4,
            TransportErrorCode::CantWrite => 7,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TransportErrorCode::TooLarge => "the uploaded file exceeds the size limit",
            TransportErrorCode::Partial => "the uploaded file was only partially received",
            TransportErrorCode::NoFile => "no file was uploaded",
            TransportErrorCode::CantWrite => "failed to buffer the uploaded file",
        }
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// One received upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Transport peer address, never a client-supplied header
    pub client_addr: IpAddr,
    pub file_name: String,
    pub content: Bytes,
    pub transport_error: Option<TransportErrorCode>,
}

impl UploadRequest {
    pub fn new(client_addr: IpAddr, file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            client_addr,
            file_name: file_name.into(),
            content: content.into(),
            transport_error: None,
        }
    }

    /// Request whose file never arrived intact
    pub fn failed(client_addr: IpAddr, file_name: impl Into<String>, code: TransportErrorCode) -> Self {
        Self {
            client_addr,
            file_name: file_name.into(),
            content: Bytes::new(),
            transport_error: Some(code),
        }
    }
}

/// Behaviour of one named upload endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointProfile {
    pub name: String,
    pub root: PathBuf,
    pub append_client_addr: bool,
    pub decode: bool,
    pub report: bool,
    pub notify: bool,
    pub max_report_lines: usize,
    pub max_line_bytes: usize,
}

impl EndpointProfile {
    pub fn from_config(name: impl Into<String>, config: &EndpointConfig) -> Self {
        Self {
            name: name.into(),
            root: config.root.clone(),
            append_client_addr: config.append_client_addr,
            decode: config.decode,
            report: config.report,
            notify: config.notify,
            max_report_lines: config.max_report_lines,
            max_line_bytes: config.max_line_bytes,
        }
    }
}

/// Result of a stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_name: String,
    pub path: PathBuf,
    pub size: usize,
    pub notified: bool,
}

impl UploadReceipt {
    /// Status text returned to the uploading client
    pub fn render(&self) -> String {
        format!(
            "Upload: {}<br />\nSize: {:.1} Kb<br />\nStored in: {}<br />\n",
            self.file_name,
            self.size as f64 / 1024.0,
            self.path.display()
        )
    }
}
