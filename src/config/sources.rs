use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LOGDROP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/logdrop.toml";
const ENV_PREFIX: &str = "LOGDROP";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (explicit path, `LOGDROP_CONFIG`, or the default location)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// SMTP credentials are only ever read from the environment
fn load_secrets(config: &mut Config) {
    if let Ok(username) = env::var("SMTP_USERNAME") {
        config.notify.smtp_username = Some(username);
    }
    if let Ok(password) = env::var("SMTP_PASSWORD") {
        config.notify.smtp_password = Some(password);
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // LOGDROP__NOTIFY__RECIPIENT -> notify.recipient
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
max_upload_bytes = "10MB"

[decode]
uudecode_path = "/usr/local/bin/uudecode"
timeout_secs = 15
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.max_upload_bytes.as_u64(), 10 * 1024 * 1024);
        assert_eq!(
            config.decode.uudecode_path,
            PathBuf::from("/usr/local/bin/uudecode")
        );
        assert_eq!(config.decode.gzip_path, PathBuf::from("gzip"));
        assert_eq!(config.decode.timeout_secs, 15);
    }

    #[test]
    fn test_complex_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"
max_upload_bytes = 1048576

[notify]
transport = "smtp"
recipient = "support@example.org"
from = "reports@example.org"
smtp_host = "smtp.example.org"
smtp_port = 25
smtp_starttls = false
reply_to_submitter = false

[endpoints.corelog]
root = "/srv/corelogUploads"
decode = true
report = true
notify = true
max_report_lines = 2000
max_line_bytes = 1024

[endpoints.config]
root = "/srv/configUploads"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();

        assert_eq!(config.server.max_upload_bytes.as_u64(), 1024 * 1024);

        assert_eq!(config.notify.recipient.as_deref(), Some("support@example.org"));
        assert_eq!(config.notify.smtp_port, 25);
        assert!(!config.notify.smtp_starttls);
        assert!(!config.notify.reply_to_submitter);
        // Secrets never come from the file
        assert!(config.notify.smtp_password.is_none());

        assert_eq!(config.endpoints.len(), 2);
        let corelog = &config.endpoints["corelog"];
        assert_eq!(corelog.max_report_lines, 2000);
        assert_eq!(corelog.max_line_bytes, 1024);
        assert!(corelog.notify);
        let cfg = &config.endpoints["config"];
        assert!(cfg.append_client_addr);
        assert!(!cfg.decode);
        assert_eq!(cfg.max_line_bytes, crate::report::DEFAULT_MAX_LINE_BYTES);
    }
}
