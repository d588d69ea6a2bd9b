//! JSON bodies served by the API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub version: String,
    pub metrics: MetricsSnapshot,
}
