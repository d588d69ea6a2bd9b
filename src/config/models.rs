use crate::humanize::ByteSize;
use crate::report::{DEFAULT_MAX_LINE_BYTES, DEFAULT_MAX_LINES, DEFAULT_SUBJECT_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Upload endpoints by name; the built-in set applies when empty
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl Config {
    /// Configured endpoints, or the built-in `corelog` and `config` pair
    pub fn resolved_endpoints(&self) -> BTreeMap<String, EndpointConfig> {
        if self.endpoints.is_empty() {
            builtin_endpoints()
        } else {
            self.endpoints.clone()
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Largest accepted file, e.g. `"64MB"`
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize(64 * 1024 * 1024) // 64 MB
}

/// External decoder binaries
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecodeConfig {
    #[serde(default = "default_uudecode_path")]
    pub uudecode_path: PathBuf,
    #[serde(default = "default_gzip_path")]
    pub gzip_path: PathBuf,
    /// Per-invocation limit; 0 disables the timeout
    #[serde(default = "default_decode_timeout_secs")]
    pub timeout_secs: u64,
    /// An encoded upload untouched this long is treated as abandoned
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            uudecode_path: default_uudecode_path(),
            gzip_path: default_gzip_path(),
            timeout_secs: default_decode_timeout_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_uudecode_path() -> PathBuf {
    PathBuf::from("uudecode")
}

fn default_gzip_path() -> PathBuf {
    PathBuf::from("gzip")
}

fn default_decode_timeout_secs() -> u64 {
    60
}

fn default_stale_after_secs() -> u64 {
    600
}

/// Mail transport type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyTransport {
    Smtp,
    Sendmail,
    #[default]
    Log,
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub transport: NotifyTransport,
    /// Single destination for report notifications
    pub recipient: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Use the submitter's extracted e-mail as Reply-To
    #[serde(default = "default_true")]
    pub reply_to_submitter: bool,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_true")]
    pub smtp_starttls: bool,
    /// Loaded from environment, not from config file
    #[serde(skip)]
    pub smtp_username: Option<String>,
    /// Loaded from environment, not from config file
    #[serde(skip)]
    pub smtp_password: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            transport: NotifyTransport::default(),
            recipient: None,
            from: default_from(),
            subject_prefix: default_subject_prefix(),
            reply_to_submitter: true,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_starttls: true,
            smtp_username: None,
            smtp_password: None,
        }
    }
}

fn default_from() -> String {
    "logdrop@localhost.localdomain".to_string()
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

/// One upload endpoint (`POST /upload/<name>`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Storage root; month directories are created beneath it
    pub root: PathBuf,
    /// Suffix stored names with `_<client address>`
    #[serde(default = "default_true")]
    pub append_client_addr: bool,
    /// Run uudecode + gunzip on the upload
    #[serde(default)]
    pub decode: bool,
    /// Scan the stored text for submitter tags
    #[serde(default)]
    pub report: bool,
    /// Email the report (requires `report`)
    #[serde(default)]
    pub notify: bool,
    #[serde(default = "default_max_report_lines")]
    pub max_report_lines: usize,
    /// Longer report lines are cut to this many bytes
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_max_report_lines() -> usize {
    DEFAULT_MAX_LINES
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn builtin_endpoints() -> BTreeMap<String, EndpointConfig> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        "corelog".to_string(),
        EndpointConfig {
            root: PathBuf::from("corelogUploads"),
            append_client_addr: true,
            decode: true,
            report: true,
            notify: true,
            max_report_lines: DEFAULT_MAX_LINES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        },
    );
    endpoints.insert(
        "config".to_string(),
        EndpointConfig {
            root: PathBuf::from("configUploads"),
            append_client_addr: true,
            decode: false,
            report: false,
            notify: false,
            max_report_lines: DEFAULT_MAX_LINES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        },
    );
    endpoints
}
