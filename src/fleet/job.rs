use crate::device::{AuthError, CallError, Connector, DeviceSession, Operation};
use crate::domain::{DeviceEndpoint, DeviceId, FailureKind, JobFailure};
use crate::fleet::AbortSignal;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// The work one job performs inside its session.
#[derive(Debug, Clone)]
pub enum JobTask {
    Operations(Arc<[Operation]>),
    Backup,
}

#[derive(Debug, Clone, Copy)]
pub struct JobSettings {
    call_timeout: Duration,
}

impl JobSettings {
    pub fn new(call_timeout: Duration) -> Self {
        JobSettings { call_timeout }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step<'a> {
    Call(&'a Operation),
    Backup,
}

/// Opens a session, performs `task` and closes the session again.
///
/// Every network call is bounded by the call timeout. Once a session is open it is closed exactly once, also when
/// the task fails or the run is aborted while the task is in flight.
#[instrument(skip_all, fields(device_id = %endpoint.id()))]
pub async fn run_job(
    connector: &dyn Connector,
    endpoint: &DeviceEndpoint,
    task: &JobTask,
    settings: JobSettings,
    mut abort: AbortSignal,
) -> Result<Value, JobFailure> {
    let device = endpoint.id();
    if abort.is_aborted() {
        return Err(JobFailure::new(device.clone(), FailureKind::Aborted, "run aborted before the job started"));
    }

    let mut session = match timeout(settings.call_timeout, connector.open(endpoint)).await {
        Ok(Ok(session)) => session,
        Ok(Err(error)) => {
            warn!("⚠️ Opening session... failed, {}", error);
            return Err(auth_failure(device, &error));
        }
        Err(_) => {
            warn!("⚠️ Opening session... failed, timed out after {:?}", settings.call_timeout);
            return Err(timeout_failure(device, "login", settings.call_timeout));
        }
    };
    debug!("🔓 Opening session... OK");

    let outcome = tokio::select! {
        biased;
        _ = abort.aborted() => Err(JobFailure::new(device.clone(), FailureKind::Aborted, "run aborted while the job was in flight")),
        outcome = perform(session.as_mut(), task, settings) => outcome,
    };

    close(session.as_mut(), settings).await;
    outcome
}

async fn perform(session: &mut dyn DeviceSession, task: &JobTask, settings: JobSettings) -> Result<Value, JobFailure> {
    match task {
        JobTask::Backup => execute(session, Step::Backup, settings).await,
        JobTask::Operations(operations) => {
            let mut payloads = Vec::with_capacity(operations.len());
            for operation in operations.iter() {
                payloads.push(execute(session, Step::Call(operation), settings).await?);
            }

            if payloads.len() == 1 { Ok(payloads.remove(0)) } else { Ok(Value::Array(payloads)) }
        }
    }
}

/// Runs one step, logging in again at most once when the device reports an expired session.
async fn execute(session: &mut dyn DeviceSession, step: Step<'_>, settings: JobSettings) -> Result<Value, JobFailure> {
    let device = session.device().clone();

    let first = bounded(settings.call_timeout, attempt(session, step)).await;
    match first {
        Err(CallError::SessionExpired) => {
            info!("🔑 Session expired, logging in again...");
            match timeout(settings.call_timeout, session.reauthenticate()).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => return Err(auth_failure(&device, &error)),
                Err(_) => return Err(timeout_failure(&device, "login", settings.call_timeout)),
            }

            bounded(settings.call_timeout, attempt(session, step))
                .await
                .map_err(|error| call_failure(&device, &error, settings.call_timeout))
        }
        outcome => outcome.map_err(|error| call_failure(&device, &error, settings.call_timeout)),
    }
}

async fn attempt(session: &mut dyn DeviceSession, step: Step<'_>) -> Result<Value, CallError> {
    match step {
        Step::Call(operation) => session.call(operation).await,
        Step::Backup => session.fetch_backup().await.map(Value::String),
    }
}

async fn bounded<T>(limit: Duration, future: impl Future<Output = Result<T, CallError>>) -> Result<T, CallError> {
    timeout(limit, future).await.unwrap_or(Err(CallError::Timeout))
}

async fn close(session: &mut dyn DeviceSession, settings: JobSettings) {
    match timeout(settings.call_timeout, session.close()).await {
        Ok(Ok(())) => debug!("🔒 Closing session... OK"),
        Ok(Err(error)) => warn!("⚠️ Closing session... failed, {}", error),
        Err(_) => warn!("⚠️ Closing session... failed, timed out after {:?}", settings.call_timeout),
    }
}

fn auth_failure(device: &DeviceId, error: &AuthError) -> JobFailure {
    let kind = match error {
        AuthError::Timeout => FailureKind::Timeout,
        _ => FailureKind::Auth,
    };
    JobFailure::new(device.clone(), kind, error.to_string())
}

fn call_failure(device: &DeviceId, error: &CallError, limit: Duration) -> JobFailure {
    match error {
        CallError::SessionExpired => JobFailure::new(device.clone(), FailureKind::SessionExpired, error.to_string()),
        CallError::Timeout => timeout_failure(device, "request", limit),
        _ => JobFailure::new(device.clone(), FailureKind::Call, error.to_string()),
    }
}

fn timeout_failure(device: &DeviceId, what: &str, limit: Duration) -> JobFailure {
    JobFailure::new(device.clone(), FailureKind::Timeout, format!("{} timed out after {:?}", what, limit))
}
