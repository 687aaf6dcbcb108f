use crate::domain::{DeviceId, JobFailure};
use crate::drift::DriftReport;
use crate::notify::NotificationOutcome;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Poll,
    Drift,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriftOutcome {
    Unchanged {
        notification: NotificationOutcome,
    },
    Drifted {
        added: usize,
        removed: usize,
        notification: NotificationOutcome,
    },
    FetchFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        previous: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current: Option<String>,
    },
}

impl DriftOutcome {
    pub fn from_report(report: &DriftReport, notification: NotificationOutcome) -> Self {
        if report.has_drift() {
            DriftOutcome::Drifted {
                added: report.added(),
                removed: report.removed(),
                notification,
            }
        } else {
            DriftOutcome::Unchanged { notification }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<DeviceId, Value>,
    pub failures: Vec<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(mode: RunMode, outcomes: BTreeMap<DeviceId, Result<Value, JobFailure>>, drift: Option<DriftOutcome>) -> Self {
        let total = outcomes.len();
        let mut results = BTreeMap::new();
        let mut failures = Vec::new();

        for (device, outcome) in outcomes {
            match outcome {
                Ok(payload) => {
                    results.insert(device, payload);
                }
                Err(failure) => failures.push(failure),
            }
        }

        RunSummary {
            mode,
            total,
            succeeded: results.len(),
            failed: failures.len(),
            results,
            failures,
            drift,
        }
    }
}
