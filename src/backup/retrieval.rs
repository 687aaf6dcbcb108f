use crate::backup::{ArchiveError, BackupArchive};
use crate::device::Connector;
use crate::domain::{DeviceEndpoint, DeviceId, FailureKind, JobFailure, Snapshot, SnapshotSource};
use crate::fleet::{AbortSignal, JobSettings, JobTask, run_job};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("archived backup is unavailable: {0}")]
    ArchiveUnavailable(String),
    #[error("unable to decrypt archived backup: {0}")]
    DecryptFailed(String),
    #[error("unable to extract archived backup: {0}")]
    ExtractFailed(String),
    #[error("unable to fetch live backup, {0}")]
    Device(JobFailure),
}

impl From<ArchiveError> for FetchError {
    fn from(error: ArchiveError) -> Self {
        match error {
            ArchiveError::Unavailable(reason) => FetchError::ArchiveUnavailable(reason),
            ArchiveError::Decrypt(reason) => FetchError::DecryptFailed(reason),
            ArchiveError::Extract(reason) => FetchError::ExtractFailed(reason),
        }
    }
}

/// Loads the latest archived backup of `device`.
#[instrument(skip_all, fields(device_id = %device))]
pub async fn fetch_previous(
    archive: &dyn BackupArchive,
    device: &DeviceId,
    ignore_line_prefixes: &[String],
) -> Result<Snapshot, FetchError> {
    info!("🗄️ Fetching archived backup...");

    let bytes = archive.fetch_backup(device).await?;
    let bytes = archive.decrypt_backup(bytes)?;
    let text = archive.extract_backup(bytes)?;

    info!("🗄️ Fetching archived backup... OK, {} bytes", text.len());
    Ok(Snapshot::capture(device.clone(), SnapshotSource::Archived, &text, ignore_line_prefixes))
}

/// Downloads the running configuration from the device within its own session.
#[instrument(skip_all, fields(device_id = %endpoint.id()))]
pub async fn fetch_current(
    connector: &dyn Connector,
    endpoint: &DeviceEndpoint,
    settings: JobSettings,
    abort: AbortSignal,
    ignore_line_prefixes: &[String],
) -> Result<Snapshot, FetchError> {
    info!("📥 Fetching live backup...");

    let payload = run_job(connector, endpoint, &JobTask::Backup, settings, abort)
        .await
        .map_err(FetchError::Device)?;

    let text = match payload {
        Value::String(text) => text,
        other => {
            return Err(FetchError::Device(JobFailure::new(
                endpoint.id().clone(),
                FailureKind::Call,
                format!("expected backup text, got {}", other),
            )));
        }
    };

    info!("📥 Fetching live backup... OK, {} bytes", text.len());
    Ok(Snapshot::capture(endpoint.id().clone(), SnapshotSource::Live, &text, ignore_line_prefixes))
}

/// Fetches the archived and the live backup concurrently. Neither failure cancels the other fetch.
pub async fn fetch_both(
    archive: &dyn BackupArchive,
    connector: &dyn Connector,
    endpoint: &DeviceEndpoint,
    settings: JobSettings,
    abort: AbortSignal,
    ignore_line_prefixes: &[String],
) -> (Result<Snapshot, FetchError>, Result<Snapshot, FetchError>) {
    let (previous, current) = tokio::join!(
        fetch_previous(archive, endpoint.id(), ignore_line_prefixes),
        fetch_current(connector, endpoint, settings, abort, ignore_line_prefixes),
    );

    if let Err(error) = &previous {
        warn!(device_id = %endpoint.id(), "⚠️ Fetching archived backup... failed, {}", error);
    }
    if let Err(error) = &current {
        warn!(device_id = %endpoint.id(), "⚠️ Fetching live backup... failed, {}", error);
    }

    (previous, current)
}
