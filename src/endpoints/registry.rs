use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::handler::{SharedServices, UploadHandler};
use super::types::EndpointProfile;
use crate::config::Config;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("endpoint not found: {0}")]
    NotFound(String),
}

/// Registry mapping endpoint names to their upload handlers
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    handlers: BTreeMap<String, Arc<UploadHandler>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: UploadHandler) {
        let name = handler.profile().name.clone();
        self.handlers.insert(name, Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Result<Arc<UploadHandler>, RegistryError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// One handler per configured endpoint (built-ins when none are configured)
    pub fn from_config(config: &Config, services: SharedServices) -> Self {
        let mut registry = Self::new();
        for (name, endpoint) in config.resolved_endpoints() {
            let profile = EndpointProfile::from_config(name, &endpoint);
            tracing::debug!(
                endpoint = %profile.name,
                root = %profile.root.display(),
                decode = profile.decode,
                notify = profile.notify,
                "Registered upload endpoint"
            );
            registry.register(UploadHandler::new(profile, services.clone()));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::decode::ShellDecoder;
    use crate::endpoints::handler::MailSettings;
    use crate::notify::LogNotifier;
    use crate::observability::Metrics;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn services() -> SharedServices {
        SharedServices {
            decoder: Arc::new(ShellDecoder::new("uudecode", "gzip", None)),
            notifier: Arc::new(LogNotifier::new()),
            clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())),
            metrics: Arc::new(Metrics::new()),
            mail: MailSettings {
                recipient: None,
                subject_prefix: "New Problem Report".to_string(),
                reply_to_submitter: true,
            },
            stale_upload_after: Duration::from_secs(600),
        }
    }

    #[test]
    fn test_builtin_endpoints() {
        let registry = EndpointRegistry::from_config(&Config::default(), services());

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["config", "corelog"]);

        let corelog = registry.get("corelog").unwrap();
        assert!(corelog.profile().decode);
        assert!(corelog.profile().notify);

        let config = registry.get("config").unwrap();
        assert!(!config.profile().decode);
        assert!(!config.profile().report);
    }

    #[test]
    fn test_unknown_endpoint() {
        let registry = EndpointRegistry::from_config(&Config::default(), services());
        match registry.get("crashdump") {
            Err(RegistryError::NotFound(name)) => assert_eq!(name, "crashdump"),
            Ok(_) => panic!("Expected NotFound"),
        }
    }
}
