use crate::domain::DeviceId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    Archived,
    Live,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Archived => f.write_str("archived"),
            SnapshotSource::Live => f.write_str("live"),
        }
    }
}

/// Normalized configuration text of one device at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    device: DeviceId,
    source: SnapshotSource,
    content: String,
    retrieved_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(device: DeviceId, source: SnapshotSource, content: String, retrieved_at: DateTime<Utc>) -> Self {
        Snapshot {
            device,
            source,
            content,
            retrieved_at,
        }
    }

    /// Normalizes `raw` and stamps it with the current time.
    pub fn capture(device: DeviceId, source: SnapshotSource, raw: &str, ignore_line_prefixes: &[String]) -> Self {
        Snapshot::new(device, source, normalize(raw, ignore_line_prefixes), Utc::now())
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }
}

/// Unifies line endings, strips trailing whitespace and trailing blank lines, and drops volatile lines.
pub fn normalize(raw: &str, ignore_line_prefixes: &[String]) -> String {
    let lines = raw
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let trimmed = line.trim_start();
            !ignore_line_prefixes.iter().any(|prefix| trimmed.starts_with(prefix.as_str()))
        })
        .collect::<Vec<_>>();

    let end = lines.iter().rposition(|line| !line.is_empty()).map_or(0, |index| index + 1);
    if end == 0 {
        return String::new();
    }

    let mut normalized = lines[..end].join("\n");
    normalized.push('\n');
    normalized
}
