use crate::device::{AuthError, CallError, Connector, DeviceSession, Operation};
use crate::domain::{Credentials, DeviceEndpoint, DeviceId};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub enum Behaviour {
    #[default]
    Healthy,
    RejectLogin,
    RejectFirstLogin,
    HangLogin,
    FailCall,
    HangCall,
    ExpireOnce,
    HangRelogin,
    AlwaysExpired,
    FailLogout,
    Backup(String),
}

/// Counts logins, logouts and the peak number of simultaneously open sessions.
///
/// `logouts` counts every call to `close`, so a session closed twice shows up as an extra logout.
#[derive(Debug, Default)]
pub struct Stats {
    logins: AtomicUsize,
    relogins: AtomicUsize,
    logouts: AtomicUsize,
    open: AtomicUsize,
    peak_open: AtomicUsize,
    logged_out: Mutex<Vec<DeviceId>>,
}

impl Stats {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn relogins(&self) -> usize {
        self.relogins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    pub fn logged_out(&self) -> Vec<DeviceId> {
        let mut devices = self.logged_out.lock().unwrap().clone();
        devices.sort();
        devices
    }
}

#[derive(Debug, Default)]
pub struct FakeConnector {
    behaviours: HashMap<DeviceId, Behaviour>,
    call_delay: Duration,
    stats: Arc<Stats>,
    rejected: Mutex<HashSet<DeviceId>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        FakeConnector::default()
    }

    pub fn with(mut self, device: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(DeviceId::new(device), behaviour);
        self
    }

    pub fn call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn DeviceSession>, AuthError> {
        let behaviour = self.behaviours.get(endpoint.id()).cloned().unwrap_or_default();
        if let Behaviour::HangLogin = behaviour {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let reject = match behaviour {
            Behaviour::RejectLogin => true,
            Behaviour::RejectFirstLogin => self.rejected.lock().unwrap().insert(endpoint.id().clone()),
            _ => false,
        };
        if reject {
            return Err(AuthError::Rejected(StatusCode::UNAUTHORIZED));
        }

        self.stats.logins.fetch_add(1, Ordering::SeqCst);
        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_open.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            device: endpoint.id().clone(),
            behaviour,
            call_delay: self.call_delay,
            stats: self.stats.clone(),
            expired: false,
            closed: false,
        }))
    }
}

struct FakeSession {
    device: DeviceId,
    behaviour: Behaviour,
    call_delay: Duration,
    stats: Arc<Stats>,
    expired: bool,
    closed: bool,
}

impl FakeSession {
    async fn respond(&mut self) -> Result<(), CallError> {
        if self.closed {
            return Err(CallError::SessionExpired);
        }
        tokio::time::sleep(self.call_delay).await;

        match self.behaviour {
            Behaviour::FailCall => Err(CallError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "internal error".to_string(),
            }),
            Behaviour::HangCall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            Behaviour::ExpireOnce | Behaviour::HangRelogin if !self.expired => {
                self.expired = true;
                Err(CallError::SessionExpired)
            }
            Behaviour::AlwaysExpired => Err(CallError::SessionExpired),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceSession for FakeSession {
    fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn call(&mut self, operation: &Operation) -> Result<Value, CallError> {
        self.respond().await?;
        Ok(json!({"device": self.device.as_str(), "path": operation.path(), "status": "success"}))
    }

    async fn fetch_backup(&mut self) -> Result<String, CallError> {
        self.respond().await?;
        match &self.behaviour {
            Behaviour::Backup(text) => Ok(text.clone()),
            _ => Ok(String::new()),
        }
    }

    async fn reauthenticate(&mut self) -> Result<(), AuthError> {
        self.stats.relogins.fetch_add(1, Ordering::SeqCst);
        if let Behaviour::HangRelogin = self.behaviour {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), CallError> {
        self.stats.logouts.fetch_add(1, Ordering::SeqCst);
        self.stats.logged_out.lock().unwrap().push(self.device.clone());
        if !std::mem::replace(&mut self.closed, true) {
            self.stats.open.fetch_sub(1, Ordering::SeqCst);
        }

        match self.behaviour {
            Behaviour::FailLogout => Err(CallError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: "logout failed".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

pub fn endpoint(id: &str) -> DeviceEndpoint {
    let url = Url::parse(&format!("https://{}.example.net", id)).unwrap();
    DeviceEndpoint::new(DeviceId::new(id), url, Arc::new(Credentials::new("admin", "secret")))
}

pub fn endpoints(count: usize) -> Vec<DeviceEndpoint> {
    (1..=count).map(|index| endpoint(&format!("fw-{}", index))).collect()
}
