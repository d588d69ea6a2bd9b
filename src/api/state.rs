use std::sync::Arc;

use crate::config::Config;
use crate::endpoints::EndpointRegistry;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<EndpointRegistry>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, registry: EndpointRegistry, metrics: Arc<Metrics>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            metrics,
        }
    }
}
