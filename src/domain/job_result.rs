use crate::domain::DeviceId;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    SessionExpired,
    Call,
    Timeout,
    Fetch,
    Aborted,
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Auth => "authentication failed",
            FailureKind::SessionExpired => "session expired",
            FailureKind::Call => "call failed",
            FailureKind::Timeout => "timed out",
            FailureKind::Fetch => "backup retrieval failed",
            FailureKind::Aborted => "aborted",
            FailureKind::Panicked => "job panicked",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub device: DeviceId,
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(device: DeviceId, kind: FailureKind, message: impl Into<String>) -> Self {
        JobFailure {
            device,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}, {}", self.device, self.kind, self.message)
    }
}

/// The outcome of exactly one device job.
#[derive(Debug)]
pub struct JobResult {
    device: DeviceId,
    outcome: Result<Value, JobFailure>,
}

impl JobResult {
    pub fn new(device: DeviceId, outcome: Result<Value, JobFailure>) -> Self {
        JobResult { device, outcome }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn outcome(&self) -> &Result<Value, JobFailure> {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_parts(self) -> (DeviceId, Result<Value, JobFailure>) {
        (self.device, self.outcome)
    }
}
