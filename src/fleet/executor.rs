use crate::domain::{DeviceEndpoint, DeviceId, FailureKind, JobFailure, JobResult};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

/// Runs `job` once per endpoint with at most `concurrency_limit` jobs in flight.
///
/// Returns one result per submitted endpoint, in completion order. A failing or panicking job only affects its own
/// result.
#[instrument(skip_all, fields(devices = endpoints.len(), concurrency_limit = concurrency_limit))]
pub async fn run<F, Fut>(endpoints: Vec<DeviceEndpoint>, concurrency_limit: usize, job: F) -> Result<Vec<JobResult>, ExecutorError>
where
    F: Fn(DeviceEndpoint) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, JobFailure>> + Send + 'static,
{
    validate(&endpoints, concurrency_limit)?;

    let total = endpoints.len();
    info!("🚀 Running {} job(s), at most {} at a time...", total, concurrency_limit);

    let semaphore = Arc::new(Semaphore::new(concurrency_limit));
    let job = Arc::new(job);

    let jobs = endpoints.into_iter().map(|endpoint| {
        let device = endpoint.id().clone();
        let semaphore = semaphore.clone();
        let job = job.clone();

        let handle = tokio::spawn(async move {
            // Released when the task ends, also when the job panics
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| JobFailure::new(endpoint.id().clone(), FailureKind::Aborted, "concurrency budget closed"))?;
            job(endpoint).await
        });

        async move { (device, handle.await) }
    });

    let results = FuturesUnordered::from_iter(jobs)
        .map(|(device, joined)| match joined {
            Ok(outcome) => JobResult::new(device, outcome),
            Err(e) => {
                error!(device_id = %device, "❌ Job for device '{}' did not complete: {}", device, e);
                let failure = JobFailure::new(device.clone(), FailureKind::Panicked, e.to_string());
                JobResult::new(device, Err(failure))
            }
        })
        .collect::<Vec<_>>()
        .await;

    let succeeded = results.iter().filter(|result| result.is_success()).count();
    info!("🚀 Running {} job(s)... OK, {} succeeded, {} failed", total, succeeded, total - succeeded);

    Ok(results)
}

fn validate(endpoints: &[DeviceEndpoint], concurrency_limit: usize) -> Result<(), ExecutorError> {
    if endpoints.is_empty() {
        return Err(ExecutorError::NoEndpoints);
    }

    if concurrency_limit == 0 || concurrency_limit > Semaphore::MAX_PERMITS {
        return Err(ExecutorError::InvalidConcurrencyLimit {
            limit: concurrency_limit,
            max: Semaphore::MAX_PERMITS,
        });
    }

    let mut seen = HashSet::with_capacity(endpoints.len());
    if let Some(duplicate) = endpoints.iter().find(|endpoint| !seen.insert(endpoint.id())) {
        return Err(ExecutorError::DuplicateDevice(duplicate.id().clone()));
    }

    Ok(())
}

#[derive(Error, Debug, PartialEq)]
pub enum ExecutorError {
    #[error("no devices were submitted")]
    NoEndpoints,
    #[error("the concurrency limit must be between 1 and {max}, got {limit}")]
    InvalidConcurrencyLimit { limit: usize, max: usize },
    #[error("device '{0}' was submitted more than once")]
    DuplicateDevice(DeviceId),
}
