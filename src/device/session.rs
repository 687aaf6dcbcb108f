use crate::device::Operation;
use crate::domain::{DeviceEndpoint, DeviceId};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Opens authenticated sessions against devices.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn DeviceSession>, AuthError>;
}

/// One authenticated connection to one device, owned by exactly one job.
///
/// Calls are sequential. `close` must be called once the job is done with the session, whatever the outcome
/// of its calls, and never fails the job.
#[async_trait]
pub trait DeviceSession: Send {
    fn device(&self) -> &DeviceId;

    async fn call(&mut self, operation: &Operation) -> Result<Value, CallError>;

    async fn fetch_backup(&mut self) -> Result<String, CallError>;

    async fn reauthenticate(&mut self) -> Result<(), AuthError>;

    async fn close(&mut self) -> Result<(), CallError>;
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("login rejected with status {0}")]
    Rejected(StatusCode),
    #[error("login answered without a '{0}' cookie")]
    MissingToken(String),
    #[error("login timed out")]
    Timeout,
    #[error("login request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() { AuthError::Timeout } else { AuthError::Transport(error) }
    }
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error("session expired or not authenticated")]
    SessionExpired,
    #[error("device answered with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl From<reqwest::Error> for CallError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() { CallError::Timeout } else { CallError::Transport(error) }
    }
}
