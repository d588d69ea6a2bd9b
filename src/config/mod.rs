//! Configuration management for logdrop
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Environment Variables
//!
//! Any key can be overridden with `LOGDROP__<section>__<key>`:
//! - `LOGDROP__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `LOGDROP__NOTIFY__RECIPIENT=support@example.org`
//!
//! SMTP credentials are read only from `SMTP_USERNAME` / `SMTP_PASSWORD`.
//!
//! # Configuration File
//!
//! Loaded from `config/logdrop.toml` unless `LOGDROP_CONFIG` or an explicit
//! path says otherwise.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, DecodeConfig, EndpointConfig, NotifyConfig, NotifyTransport, ServerConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file, .env, environment)
    ///
    /// `path` overrides both `LOGDROP_CONFIG` and the default location.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from a specific file plus `LOGDROP__*` overrides, without
    /// `.env` or secrets
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Check an already-built configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}
