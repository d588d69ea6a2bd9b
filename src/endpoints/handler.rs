use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use super::error::UploadError;
use super::types::{EndpointProfile, UploadReceipt, UploadRequest};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::decode::{DecodeError, Decoder, ShellDecoder};
use crate::notify::{self, Notification, NotifyError, Notifier, is_valid_address};
use crate::observability::Metrics;
use crate::report::{self, ReportSummary};
use crate::storage::{ArtifactStore, StorageError, StoredArtifact, validate_file_name};

/// Notification settings shared by all endpoints
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub recipient: Option<String>,
    pub subject_prefix: String,
    pub reply_to_submitter: bool,
}

/// Collaborators shared by every endpoint handler
#[derive(Clone)]
pub struct SharedServices {
    pub decoder: Arc<dyn Decoder>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<Metrics>,
    pub mail: MailSettings,
    /// An encoded upload older than this is a leftover, not an upload in flight
    pub stale_upload_after: Duration,
}

impl SharedServices {
    /// Production wiring: shell decoder, configured mail transport, wall clock
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self, NotifyError> {
        Ok(Self {
            decoder: Arc::new(ShellDecoder::from_config(&config.decode)),
            notifier: notify::from_config(&config.notify)?,
            clock: Arc::new(SystemClock),
            metrics,
            mail: MailSettings {
                recipient: config.notify.recipient.clone(),
                subject_prefix: config.notify.subject_prefix.clone(),
                reply_to_submitter: config.notify.reply_to_submitter,
            },
            stale_upload_after: Duration::from_secs(config.decode.stale_after_secs),
        })
    }
}

/// Receives uploads for one endpoint profile
///
/// ## Flow:
/// 1. Ensure `<root>/<YYYYMM>` exists
/// 2. Reject transport failures, empty and unsafe file names
/// 3. Reject duplicates (final artifact already present)
/// 4. Write the upload (create-new, so racing duplicates also fail);
///    a stale `.uu` left by an interrupted decode is cleared first
/// 5. Decode `.uu` -> `.gz` -> final when the profile asks for it
/// 6. Scan the report and send the notification when enabled
pub struct UploadHandler {
    profile: EndpointProfile,
    store: ArtifactStore,
    services: SharedServices,
}

impl UploadHandler {
    pub fn new(profile: EndpointProfile, services: SharedServices) -> Self {
        let store = ArtifactStore::new(&profile.root);
        Self {
            profile,
            store,
            services,
        }
    }

    pub fn profile(&self) -> &EndpointProfile {
        &self.profile
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn handle(&self, request: UploadRequest) -> Result<UploadReceipt, UploadError> {
        let endpoint = self.profile.name.as_str();
        let metrics = &self.services.metrics;
        let today = self.services.clock.today();

        let month_dir = self
            .store
            .ensure_month_dir(today)
            .await
            .map_err(UploadError::Storage)?;

        if let Some(code) = request.transport_error {
            warn!(endpoint, code = code.code(), client = %request.client_addr, "Upload failed in transport");
            metrics.upload_rejected();
            return Err(UploadError::Transport(code));
        }

        if request.file_name.is_empty() {
            warn!(endpoint, client = %request.client_addr, "Upload without file name");
            metrics.upload_rejected();
            return Err(UploadError::EmptyFileName);
        }

        let file_name = validate_file_name(&request.file_name).map_err(|e| {
            warn!(endpoint, file_name = %request.file_name, error = %e, "Rejected file name");
            metrics.upload_rejected();
            UploadError::from(e)
        })?;

        let artifact = self.store.artifact(
            &month_dir,
            file_name,
            request.client_addr,
            self.profile.append_client_addr,
            self.profile.decode,
        );

        if self
            .store
            .exists(artifact.final_path())
            .await
            .map_err(UploadError::Storage)?
        {
            return Err(self.duplicate(file_name, &artifact));
        }

        if artifact.needs_decode() {
            self.clear_stale_upload(&artifact).await?;
        }

        match self
            .store
            .write_new(&artifact.landing_path(), &request.content)
            .await
        {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => return Err(self.duplicate(file_name, &artifact)),
            Err(e) => {
                error!(endpoint, error = %e, "Failed to write upload");
                return Err(UploadError::Storage(e));
            }
        }

        if artifact.needs_decode() {
            if let Err(e) = self.services.decoder.decode(&artifact).await {
                if let DecodeError::TargetExists(_) = e {
                    self.discard(&artifact).await;
                    return Err(self.duplicate(file_name, &artifact));
                }
                error!(endpoint, path = %artifact.final_path().display(), error = %e, "Decoding upload failed");
                metrics.decode_failed();
                self.discard(&artifact).await;
                return Err(e.into());
            }
        }

        info!(
            endpoint,
            path = %artifact.final_path().display(),
            size = request.content.len(),
            client = %request.client_addr,
            "Upload stored"
        );

        let mut notified = false;
        if self.profile.report {
            let scanned = report::scan_file(
                artifact.final_path(),
                self.profile.max_report_lines,
                self.profile.max_line_bytes,
            )
            .await;
            match scanned {
                Ok(summary) if self.profile.notify => {
                    notified = self.send_notification(&summary, today).await;
                }
                Ok(_) => {}
                Err(e) => warn!(endpoint, error = %e, "Report scan failed, skipping notification"),
            }
        }

        metrics.upload_stored();

        Ok(UploadReceipt {
            file_name: file_name.to_string(),
            path: artifact.final_path().to_path_buf(),
            size: request.content.len(),
            notified,
        })
    }

    fn duplicate(&self, file_name: &str, artifact: &StoredArtifact) -> UploadError {
        info!(
            endpoint = %self.profile.name,
            path = %artifact.final_path().display(),
            "Duplicate upload rejected"
        );
        self.services.metrics.duplicate();
        UploadError::Duplicate {
            file_name: file_name.to_string(),
            path: artifact.final_path().to_path_buf(),
        }
    }

    async fn clear_stale_upload(&self, artifact: &StoredArtifact) -> Result<(), UploadError> {
        let encoded = artifact.encoded_path();
        let removed = self
            .store
            .remove_stale(&encoded, self.services.stale_upload_after)
            .await
            .map_err(UploadError::Storage)?;
        if removed {
            warn!(
                endpoint = %self.profile.name,
                path = %encoded.display(),
                "Removed stale encoded upload"
            );
            // Its `.gz` is as stale as the `.uu` that guarded it
            if let Err(e) = self.store.remove_if_exists(&artifact.compressed_path()).await {
                warn!(error = %e, "Failed to clean up artifact");
            }
        }
        Ok(())
    }

    /// Remove the intermediate forms of a failed upload so the client can
    /// retry. The final path is left alone: the decoder cleans up a final
    /// file it created, and any other final file belongs to another request.
    async fn discard(&self, artifact: &StoredArtifact) {
        // `.gz` first; the `.uu` keeps other requests out until both are gone
        let paths = [artifact.compressed_path(), artifact.encoded_path()];
        for path in &paths {
            if let Err(e) = self.store.remove_if_exists(path).await {
                warn!(error = %e, "Failed to clean up artifact");
            }
        }
    }

    fn build_notification(&self, summary: &ReportSummary, date: NaiveDate) -> Option<Notification> {
        let mail = &self.services.mail;
        let recipient = mail.recipient.clone()?;

        let reply_to = summary
            .submitter_email
            .clone()
            .filter(|_| mail.reply_to_submitter)
            .filter(|address| {
                let valid = is_valid_address(address);
                if !valid {
                    warn!(address = %address, "Ignoring unparseable submitter e-mail");
                }
                valid
            });

        Some(Notification {
            to: recipient,
            subject: summary.subject(&mail.subject_prefix, date),
            reply_to,
            body: summary.body.clone(),
        })
    }

    /// Delivery failures are logged and counted; the upload itself stands
    async fn send_notification(&self, summary: &ReportSummary, date: NaiveDate) -> bool {
        let endpoint = self.profile.name.as_str();
        let Some(notification) = self.build_notification(summary, date) else {
            warn!(endpoint, "No notification recipient configured");
            return false;
        };

        match self.services.notifier.send(&notification).await {
            Ok(()) => {
                info!(
                    endpoint,
                    transport = self.services.notifier.name(),
                    subject = %notification.subject,
                    "Notification sent"
                );
                self.services.metrics.notification_sent();
                true
            }
            Err(e) => {
                error!(endpoint, transport = self.services.notifier.name(), error = %e, "Notification failed");
                self.services.metrics.notification_failed();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::endpoints::types::TransportErrorCode;
    use crate::notify::RecordingNotifier;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::TempDir;

    /// Stands in for uudecode + gzip: the encoded bytes become the final file
    struct RenameDecoder;

    #[async_trait]
    impl Decoder for RenameDecoder {
        async fn decode(&self, artifact: &StoredArtifact) -> Result<(), DecodeError> {
            tokio::fs::rename(artifact.encoded_path(), artifact.final_path())
                .await
                .map_err(|e| DecodeError::DecodeFailed(e.to_string()))
        }
    }

    struct BrokenDecoder;

    #[async_trait]
    impl Decoder for BrokenDecoder {
        async fn decode(&self, artifact: &StoredArtifact) -> Result<(), DecodeError> {
            // Leave a half-written intermediate behind
            tokio::fs::write(artifact.compressed_path(), b"partial").await.ok();
            Err(DecodeError::DecompressFailed("gzip: unexpected end of file".into()))
        }
    }

    /// Another request finishes its final artifact while this one decodes
    struct RacedDecoder {
        outcome: fn(&StoredArtifact) -> DecodeError,
    }

    #[async_trait]
    impl Decoder for RacedDecoder {
        async fn decode(&self, artifact: &StoredArtifact) -> Result<(), DecodeError> {
            tokio::fs::write(artifact.final_path(), b"FIRST CLIENT REPORT")
                .await
                .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?;
            tokio::fs::write(artifact.compressed_path(), b"gz").await.ok();
            Err((self.outcome)(artifact))
        }
    }

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

    fn march_9() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn corelog_profile(root: &std::path::Path) -> EndpointProfile {
        EndpointProfile {
            name: "corelog".to_string(),
            root: root.to_path_buf(),
            append_client_addr: true,
            decode: true,
            report: true,
            notify: true,
            max_report_lines: 10_000,
            max_line_bytes: 4096,
        }
    }

    fn services(decoder: Arc<dyn Decoder>, notifier: Arc<RecordingNotifier>) -> SharedServices {
        SharedServices {
            decoder,
            notifier,
            clock: Arc::new(FixedClock(march_9())),
            metrics: Arc::new(Metrics::new()),
            mail: MailSettings {
                recipient: Some("support@example.org".to_string()),
                subject_prefix: "New Problem Report".to_string(),
                reply_to_submitter: true,
            },
            stale_upload_after: Duration::from_secs(600),
        }
    }

    fn report_text() -> &'static str {
        "#User Name: Jane Doe\n#User e-mail: jane@example.org\nCore version 2.0\n"
    }

    #[tokio::test]
    async fn test_stores_decodes_and_notifies() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(RenameDecoder), notifier.clone()),
        );

        let receipt = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", report_text()))
            .await
            .unwrap();

        let expected = temp_dir.path().join("202403").join("CoreLog.txt_192.168.1.20");
        assert_eq!(receipt.path, expected);
        assert!(receipt.notified);
        assert!(expected.exists());
        assert!(!temp_dir.path().join("202403/CoreLog.txt_192.168.1.20.uu").exists());

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "support@example.org");
        assert_eq!(sent[0].subject, "New Problem Report: 2024-03-09 Jane Doe");
        assert_eq!(sent[0].reply_to.as_deref(), Some("jane@example.org"));
        assert!(sent[0].body.starts_with(&format!("{}\n", expected.display())));
    }

    #[tokio::test]
    async fn test_transport_error_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(RenameDecoder), notifier.clone()),
        );

        let result = handler
            .handle(UploadRequest::failed(CLIENT, "CoreLog.txt", TransportErrorCode::Partial))
            .await;

        assert!(matches!(result, Err(UploadError::Transport(TransportErrorCode::Partial))));
        let entries = std::fs::read_dir(temp_dir.path().join("202403")).unwrap().count();
        assert_eq!(entries, 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_unsafe_names() {
        let temp_dir = TempDir::new().unwrap();
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(RenameDecoder), Arc::new(RecordingNotifier::new())),
        );

        let result = handler.handle(UploadRequest::new(CLIENT, "", "x")).await;
        assert!(matches!(result, Err(UploadError::EmptyFileName)));

        let result = handler
            .handle(UploadRequest::new(CLIENT, "../../etc/cron.d/x", "x"))
            .await;
        assert!(matches!(result, Err(UploadError::InvalidFileName(_))));

        assert_eq!(handler.services.metrics.snapshot().uploads_rejected, 2);
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(RenameDecoder), notifier.clone()),
        );

        let first = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", "first\n"))
            .await
            .unwrap();

        let second = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", "second\n"))
            .await;

        match second {
            Err(UploadError::Duplicate { file_name, path }) => {
                assert_eq!(file_name, "CoreLog.txt");
                assert_eq!(path, first.path);
            }
            other => panic!("Expected Duplicate, got {:?}", other),
        }
        assert_eq!(std::fs::read(&first.path).unwrap(), b"first\n");
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(handler.services.metrics.snapshot().duplicates, 1);
    }

    #[tokio::test]
    async fn test_in_flight_upload_counts_as_duplicate() {
        let temp_dir = TempDir::new().unwrap();
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(RenameDecoder), Arc::new(RecordingNotifier::new())),
        );

        let month_dir = temp_dir.path().join("202403");
        std::fs::create_dir_all(&month_dir).unwrap();
        std::fs::write(month_dir.join("CoreLog.txt_192.168.1.20.uu"), b"in flight").unwrap();

        let result = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", "late"))
            .await;
        assert!(matches!(result, Err(UploadError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_stale_encoded_upload_is_cleared() {
        let temp_dir = TempDir::new().unwrap();
        let mut shared = services(Arc::new(RenameDecoder), Arc::new(RecordingNotifier::new()));
        shared.stale_upload_after = Duration::ZERO;
        let handler = UploadHandler::new(corelog_profile(temp_dir.path()), shared);

        let month_dir = temp_dir.path().join("202403");
        std::fs::create_dir_all(&month_dir).unwrap();
        std::fs::write(month_dir.join("CoreLog.txt_192.168.1.20.uu"), b"left by a crash").unwrap();
        std::fs::write(month_dir.join("CoreLog.txt_192.168.1.20.gz"), b"half").unwrap();

        let receipt = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", "fresh\n"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&receipt.path).unwrap(), b"fresh\n");
        assert!(!month_dir.join("CoreLog.txt_192.168.1.20.gz").exists());
    }

    #[tokio::test]
    async fn test_failed_decode_keeps_concurrent_final_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let decoder = RacedDecoder {
            outcome: |_| DecodeError::DecompressFailed("gzip: file exists".into()),
        };
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(decoder), Arc::new(RecordingNotifier::new())),
        );

        let result = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", "second"))
            .await;

        assert!(matches!(
            result,
            Err(UploadError::Decode(DecodeError::DecompressFailed(_)))
        ));
        let final_path = temp_dir.path().join("202403/CoreLog.txt_192.168.1.20");
        assert_eq!(std::fs::read(&final_path).unwrap(), b"FIRST CLIENT REPORT");
        assert!(!temp_dir.path().join("202403/CoreLog.txt_192.168.1.20.uu").exists());
        assert!(!temp_dir.path().join("202403/CoreLog.txt_192.168.1.20.gz").exists());
    }

    #[tokio::test]
    async fn test_decode_into_existing_final_is_duplicate() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let decoder = RacedDecoder {
            outcome: |artifact| DecodeError::TargetExists(artifact.final_path().to_path_buf()),
        };
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(decoder), notifier.clone()),
        );

        let result = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", "second"))
            .await;

        assert!(matches!(result, Err(UploadError::Duplicate { .. })));
        let month_dir = temp_dir.path().join("202403");
        assert_eq!(
            std::fs::read(month_dir.join("CoreLog.txt_192.168.1.20")).unwrap(),
            b"FIRST CLIENT REPORT"
        );
        let entries = std::fs::read_dir(&month_dir).unwrap().count();
        assert_eq!(entries, 1);
        assert!(notifier.sent().is_empty());
        let snapshot = handler.services.metrics.snapshot();
        assert_eq!(snapshot.duplicates, 1);
        assert_eq!(snapshot.decode_failures, 0);
    }

    #[tokio::test]
    async fn test_decode_failure_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(BrokenDecoder), notifier.clone()),
        );

        let result = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", "garbage"))
            .await;

        assert!(matches!(
            result,
            Err(UploadError::Decode(DecodeError::DecompressFailed(_)))
        ));
        let entries = std::fs::read_dir(temp_dir.path().join("202403")).unwrap().count();
        assert_eq!(entries, 0);
        assert!(notifier.sent().is_empty());
        assert_eq!(handler.services.metrics.snapshot().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_upload() {
        let temp_dir = TempDir::new().unwrap();
        let handler = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(RenameDecoder), Arc::new(RecordingNotifier::failing())),
        );

        let receipt = handler
            .handle(UploadRequest::new(CLIENT, "CoreLog.txt", report_text()))
            .await
            .unwrap();

        assert!(!receipt.notified);
        assert!(receipt.path.exists());
        let snapshot = handler.services.metrics.snapshot();
        assert_eq!(snapshot.uploads_stored, 1);
        assert_eq!(snapshot.notifications_failed, 1);
    }

    #[tokio::test]
    async fn test_reply_to_policy_and_bad_address() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let mut shared = services(Arc::new(RenameDecoder), notifier.clone());
        shared.mail.reply_to_submitter = false;
        let handler = UploadHandler::new(corelog_profile(temp_dir.path()), shared);

        handler
            .handle(UploadRequest::new(CLIENT, "a.txt", report_text()))
            .await
            .unwrap();

        let notifier2 = Arc::new(RecordingNotifier::new());
        let handler2 = UploadHandler::new(
            corelog_profile(temp_dir.path()),
            services(Arc::new(RenameDecoder), notifier2.clone()),
        );
        handler2
            .handle(UploadRequest::new(
                CLIENT,
                "b.txt",
                "#User Name: Jo\n#User e-mail: not-an-address\n",
            ))
            .await
            .unwrap();

        assert_eq!(notifier.sent()[0].reply_to, None);
        assert_eq!(notifier2.sent()[0].reply_to, None);
        assert_eq!(notifier2.sent()[0].subject, "New Problem Report: 2024-03-09 Jo");
    }

    #[tokio::test]
    async fn test_store_only_profile() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let profile = EndpointProfile {
            name: "config".to_string(),
            root: temp_dir.path().to_path_buf(),
            append_client_addr: false,
            decode: false,
            report: false,
            notify: false,
            max_report_lines: 10_000,
            max_line_bytes: 4096,
        };
        let handler = UploadHandler::new(profile, services(Arc::new(BrokenDecoder), notifier.clone()));

        let receipt = handler
            .handle(UploadRequest::new(CLIENT, "MMConfig_demo.cfg", "Property,Core,Initialize,0\n"))
            .await
            .unwrap();

        assert_eq!(receipt.path, temp_dir.path().join("202403/MMConfig_demo.cfg"));
        assert_eq!(
            std::fs::read_to_string(&receipt.path).unwrap(),
            "Property,Core,Initialize,0\n"
        );
        assert!(!receipt.notified);
        assert!(notifier.sent().is_empty());
    }
}
