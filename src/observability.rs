//! In-process upload counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    uploads_stored: AtomicU64,
    uploads_rejected: AtomicU64,
    duplicates: AtomicU64,
    decode_failures: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_stored(&self) {
        self.uploads_stored.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_stored", "Metric incremented");
    }

    pub fn upload_rejected(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_rejected", "Metric incremented");
    }

    pub fn duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "duplicates", "Metric incremented");
    }

    pub fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "decode_failures", "Metric incremented");
    }

    pub fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "notifications_sent", "Metric incremented");
    }

    pub fn notification_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "notifications_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_stored: self.uploads_stored.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uploads_stored: u64,
    pub uploads_rejected: u64,
    pub duplicates: u64,
    pub decode_failures: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}
