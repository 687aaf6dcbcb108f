use crate::domain::DeviceId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The result of comparing an archived backup with the live one. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    device: DeviceId,
    previous_retrieved_at: DateTime<Utc>,
    current_retrieved_at: DateTime<Utc>,
    body: String,
    added: usize,
    removed: usize,
    #[serde(skip)]
    html: String,
}

impl DriftReport {
    pub(super) fn new(
        device: DeviceId,
        previous_retrieved_at: DateTime<Utc>,
        current_retrieved_at: DateTime<Utc>,
        body: String,
        added: usize,
        removed: usize,
        html: String,
    ) -> Self {
        DriftReport {
            device,
            previous_retrieved_at,
            current_retrieved_at,
            body,
            added,
            removed,
            html,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn previous_retrieved_at(&self) -> DateTime<Utc> {
        self.previous_retrieved_at
    }

    pub fn current_retrieved_at(&self) -> DateTime<Utc> {
        self.current_retrieved_at
    }

    /// Unified diff of the two snapshots, empty when nothing changed.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn added(&self) -> usize {
        self.added
    }

    pub fn removed(&self) -> usize {
        self.removed
    }

    pub fn has_drift(&self) -> bool {
        !self.body.is_empty()
    }
}
