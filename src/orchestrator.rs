use crate::app_config::AppConfig;
use crate::backup::{self, BackupArchive, FetchError};
use crate::device::{Connector, Operation};
use crate::domain::{DeviceEndpoint, DeviceId, DriftOutcome, FailureKind, JobFailure, JobResult, RunMode, RunSummary};
use crate::drift;
use crate::fleet::{self, AbortSignal, ExecutorError, JobSettings, JobTask, abort_signal, run_job};
use crate::notify::Dispatcher;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Drives one run, either a status poll across the fleet or a drift check of a single device.
pub struct Orchestrator {
    config: Arc<AppConfig>,
    connector: Arc<dyn Connector>,
    concurrency_limit: usize,
}

impl Orchestrator {
    pub fn new(config: Arc<AppConfig>, connector: Arc<dyn Connector>, concurrency_limit: usize) -> Self {
        Orchestrator {
            config,
            connector,
            concurrency_limit,
        }
    }

    /// Runs `operations` on every endpoint. Failed devices are resubmitted for the configured number of retry rounds,
    /// devices aborted by the run deadline are not.
    #[instrument(skip_all, fields(devices = endpoints.len()))]
    pub async fn poll(&self, endpoints: Vec<DeviceEndpoint>, operations: Vec<Operation>) -> Result<RunSummary, ExecutorError> {
        let task = JobTask::Operations(Arc::from(operations));
        let deadline = Deadline::arm(self.config.core().run_deadline());
        let retry_rounds = self.config.core().retry_rounds();

        let by_device = endpoints
            .iter()
            .map(|endpoint| (endpoint.id().clone(), endpoint.clone()))
            .collect::<HashMap<_, _>>();
        let mut outcomes = BTreeMap::new();
        let mut pending = endpoints;

        for round in 0..=retry_rounds {
            if round > 0 {
                info!("🔁 Retrying {} failed device(s), round {} of {}...", pending.len(), round, retry_rounds);
            }

            let results = self.run_batch(pending, task.clone(), deadline.signal()).await?;

            let mut retry = Vec::new();
            for result in results {
                let (device, outcome) = result.into_parts();
                if let Err(failure) = &outcome {
                    if failure.kind != FailureKind::Aborted {
                        retry.extend(by_device.get(&device).cloned());
                    }
                }
                outcomes.insert(device, outcome);
            }

            if retry.is_empty() {
                break;
            }
            pending = retry;
        }

        let summary = RunSummary::from_outcomes(RunMode::Poll, outcomes, None);
        info!("📋 Poll finished, {} of {} device(s) succeeded", summary.succeeded, summary.total);
        Ok(summary)
    }

    /// Compares the archived backup of `endpoint` with its live backup and notifies about the outcome.
    #[instrument(skip_all, fields(device_id = %endpoint.id()))]
    pub async fn check_drift(
        &self,
        endpoint: DeviceEndpoint,
        archive: &dyn BackupArchive,
        dispatcher: &Dispatcher,
        force_notify: bool,
    ) -> RunSummary {
        let deadline = Deadline::arm(self.config.core().run_deadline());
        let drift_config = self.config.drift();
        let device = endpoint.id().clone();

        let (previous, current) = backup::fetch_both(
            archive,
            self.connector.as_ref(),
            &endpoint,
            self.settings(),
            deadline.signal(),
            drift_config.ignore_line_prefixes(),
        )
        .await;

        let (outcome, drift) = match (previous, current) {
            (Ok(previous), Ok(current)) => {
                let report = drift::compare(&previous, &current);
                let force = force_notify || drift_config.notify_when_unchanged();
                let notification = dispatcher.dispatch(&report, force).await;

                let payload = json!({
                    "added": report.added(),
                    "removed": report.removed(),
                    "diff": report.body(),
                });
                (Ok(payload), DriftOutcome::from_report(&report, notification))
            }
            (previous, current) => fetch_failed(&device, previous.err(), current.err()),
        };

        RunSummary::from_outcomes(RunMode::Drift, BTreeMap::from([(device, outcome)]), Some(drift))
    }

    async fn run_batch(&self, endpoints: Vec<DeviceEndpoint>, task: JobTask, abort: AbortSignal) -> Result<Vec<JobResult>, ExecutorError> {
        let connector = self.connector.clone();
        let settings = self.settings();

        fleet::run(endpoints, self.concurrency_limit, move |endpoint| {
            let connector = connector.clone();
            let task = task.clone();
            let abort = abort.clone();
            async move { run_job(connector.as_ref(), &endpoint, &task, settings, abort).await }
        })
        .await
    }

    fn settings(&self) -> JobSettings {
        JobSettings::new(self.config.device_api().request_timeout())
    }
}

fn fetch_failed(device: &DeviceId, previous: Option<FetchError>, current: Option<FetchError>) -> (Result<Value, JobFailure>, DriftOutcome) {
    let drift = DriftOutcome::FetchFailed {
        previous: previous.as_ref().map(ToString::to_string),
        current: current.as_ref().map(ToString::to_string),
    };

    let failure = match (previous, current) {
        (_, Some(FetchError::Device(failure))) => failure,
        (previous, current) => {
            let reason = previous
                .or(current)
                .map_or_else(|| "backup retrieval failed".to_string(), |e| e.to_string());
            JobFailure::new(device.clone(), FailureKind::Fetch, reason)
        }
    };

    (Err(failure), drift)
}

/// Fires the abort signal once the run deadline passes. Dropping the guard disarms it.
struct Deadline {
    signal: AbortSignal,
    timer: Option<JoinHandle<()>>,
}

impl Deadline {
    fn arm(deadline: Option<Duration>) -> Self {
        let Some(deadline) = deadline else {
            return Deadline {
                signal: AbortSignal::never(),
                timer: None,
            };
        };

        let (handle, signal) = abort_signal();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!("⏰ Run deadline of {:?} exceeded, aborting remaining jobs", deadline);
            handle.abort();
        });

        Deadline {
            signal,
            timer: Some(timer),
        }
    }

    fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}
