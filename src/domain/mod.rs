mod endpoint;
mod job_result;
mod run_summary;
mod snapshot;

pub use endpoint::{Credentials, DeviceEndpoint, DeviceId};
pub use job_result::{FailureKind, JobFailure, JobResult};
pub use run_summary::{DriftOutcome, RunMode, RunSummary};
pub use snapshot::{Snapshot, SnapshotSource};
