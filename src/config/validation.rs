use super::models::{Config, EndpointConfig, NotifyTransport};
use crate::notify::is_valid_address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Endpoint name '{name}' must be non-empty and use only [A-Za-z0-9_-]")]
    InvalidEndpointName { name: String },

    #[error("Endpoint '{endpoint}' has an empty storage root")]
    EmptyStorageRoot { endpoint: String },

    #[error("Endpoint '{endpoint}' must scan at least one report line")]
    InvalidMaxReportLines { endpoint: String },

    #[error("Endpoint '{endpoint}' must keep at least one byte per report line")]
    InvalidMaxLineBytes { endpoint: String },

    #[error("Endpoint '{endpoint}' enables notify without report")]
    NotifyWithoutReport { endpoint: String },

    #[error("Endpoint '{endpoint}' sends notifications but notify.recipient is not set")]
    MissingNotifyRecipient { endpoint: String },

    #[error("Invalid e-mail address in notify.{field}: '{address}'")]
    InvalidNotifyAddress { field: String, address: String },

    #[error("Notify transport is smtp but notify.smtp_host is not set")]
    MissingSmtpHost,

    #[error("server.max_upload_bytes must be positive")]
    ZeroUploadLimit,

    #[error("decode.stale_after_secs ({stale_after_secs}) must exceed decode.timeout_secs ({timeout_secs})")]
    StaleWindowTooShort { stale_after_secs: u64, timeout_secs: u64 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_decode(config)?;
    validate_endpoints(config)?;
    validate_notify(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_upload_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroUploadLimit);
    }
    Ok(())
}

/// A `.uu` younger than the stale window may still be decoding
fn validate_decode(config: &Config) -> Result<(), ValidationError> {
    let decode = &config.decode;
    let unbounded = decode.timeout_secs == 0 && decode.stale_after_secs == 0;
    if unbounded || (decode.timeout_secs > 0 && decode.stale_after_secs <= decode.timeout_secs) {
        return Err(ValidationError::StaleWindowTooShort {
            stale_after_secs: decode.stale_after_secs,
            timeout_secs: decode.timeout_secs,
        });
    }
    Ok(())
}

fn is_valid_endpoint_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Names are used as URL segments; profiles must be internally consistent
fn validate_endpoints(config: &Config) -> Result<(), ValidationError> {
    for (name, endpoint) in &config.resolved_endpoints() {
        if !is_valid_endpoint_name(name) {
            return Err(ValidationError::InvalidEndpointName { name: name.clone() });
        }

        validate_endpoint(name, endpoint)?;

        if endpoint.notify && config.notify.recipient.is_none() {
            return Err(ValidationError::MissingNotifyRecipient {
                endpoint: name.clone(),
            });
        }
    }

    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &EndpointConfig) -> Result<(), ValidationError> {
    if endpoint.root.as_os_str().is_empty() {
        return Err(ValidationError::EmptyStorageRoot {
            endpoint: name.to_string(),
        });
    }

    if endpoint.report && endpoint.max_report_lines == 0 {
        return Err(ValidationError::InvalidMaxReportLines {
            endpoint: name.to_string(),
        });
    }

    if endpoint.report && endpoint.max_line_bytes == 0 {
        return Err(ValidationError::InvalidMaxLineBytes {
            endpoint: name.to_string(),
        });
    }

    if endpoint.notify && !endpoint.report {
        return Err(ValidationError::NotifyWithoutReport {
            endpoint: name.to_string(),
        });
    }

    Ok(())
}

/// Addresses must parse; SMTP needs a relay host
fn validate_notify(config: &Config) -> Result<(), ValidationError> {
    let notify = &config.notify;

    if let Some(recipient) = &notify.recipient {
        if !is_valid_address(recipient) {
            return Err(ValidationError::InvalidNotifyAddress {
                field: "recipient".to_string(),
                address: recipient.clone(),
            });
        }
    }

    if !is_valid_address(&notify.from) {
        return Err(ValidationError::InvalidNotifyAddress {
            field: "from".to_string(),
            address: notify.from.clone(),
        });
    }

    if notify.transport == NotifyTransport::Smtp && notify.smtp_host.is_none() {
        return Err(ValidationError::MissingSmtpHost);
    }

    Ok(())
}
