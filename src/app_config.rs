use crate::domain::{Credentials, DeviceEndpoint, DeviceId};
use config::Config;
use reqwest::Url;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    core: Core,
    #[serde(default)]
    device_api: DeviceApi,
    #[serde(default)]
    credentials: HashMap<String, CredentialsConfig>,
    #[serde(default)]
    devices: Vec<DeviceConfig>,
    archive: Option<Archive>,
    #[serde(default)]
    drift: Drift,
    notification: Option<Notification>,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::with_name(path).required(true))
            .add_source(config::File::with_name("config_local").required(false))
            .add_source(config::Environment::with_prefix("FLEETWATCH").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn device_api(&self) -> &DeviceApi {
        &self.device_api
    }

    pub fn drift(&self) -> &Drift {
        &self.drift
    }

    pub fn archive(&self) -> Result<&Archive, ConfigError> {
        self.archive.as_ref().ok_or(ConfigError::MissingSection("archive"))
    }

    pub fn notification(&self) -> Result<&Notification, ConfigError> {
        self.notification.as_ref().ok_or(ConfigError::MissingSection("notification"))
    }

    /// Resolves the configured devices into endpoints. An empty `only` selects the whole fleet.
    pub fn endpoints(&self, only: &[String]) -> Result<Vec<DeviceEndpoint>, ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        let credentials = self
            .credentials
            .iter()
            .map(|(name, c)| (name.as_str(), Arc::new(Credentials::new(c.username.clone(), c.password.clone()))))
            .collect::<HashMap<_, _>>();

        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            if !seen.insert(device.id.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.id.clone()));
            }

            let url = Url::parse(&device.url).map_err(|e| ConfigError::InvalidUrl {
                device: device.id.clone(),
                reason: e.to_string(),
            })?;

            let credentials = credentials.get(device.credentials.as_str()).ok_or_else(|| ConfigError::UnknownCredentials {
                device: device.id.clone(),
                reference: device.credentials.clone(),
            })?;

            endpoints.push(DeviceEndpoint::new(DeviceId::new(device.id.clone()), url, credentials.clone()));
        }

        if let Some(unknown) = only.iter().find(|id| !seen.contains(id.as_str())) {
            return Err(ConfigError::UnknownDevice(unknown.clone()));
        }

        if !only.is_empty() {
            endpoints.retain(|endpoint| only.iter().any(|id| id == endpoint.id().as_str()));
        }

        Ok(endpoints)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("no devices are configured")]
    NoDevices,
    #[error("device '{0}' is configured more than once")]
    DuplicateDevice(String),
    #[error("device '{device}' has an invalid url: {reason}")]
    InvalidUrl { device: String, reason: String },
    #[error("device '{device}' references unknown credentials '{reference}'")]
    UnknownCredentials { device: String, reference: String },
    #[error("unknown device '{0}'")]
    UnknownDevice(String),
    #[error("no drift check device was given")]
    MissingDriftDevice,
    #[error("missing configuration section '{0}'")]
    MissingSection(&'static str),
    #[error("invalid archive key: {0}")]
    InvalidArchiveKey(String),
}

#[derive(Debug, Deserialize)]
pub struct Core {
    #[serde(default = "default_concurrency_limit")]
    concurrency_limit: usize,
    #[serde(default, with = "humantime_serde")]
    run_deadline: Option<Duration>,
    #[serde(default)]
    retry_rounds: usize,
}

impl Default for Core {
    fn default() -> Self {
        Core {
            concurrency_limit: default_concurrency_limit(),
            run_deadline: None,
            retry_rounds: 0,
        }
    }
}

impl Core {
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline
    }

    pub fn retry_rounds(&self) -> usize {
        self.retry_rounds
    }
}

fn default_concurrency_limit() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceApi {
    login_path: String,
    logout_path: String,
    status_path: String,
    backup_path: String,
    csrf_cookie: String,
    csrf_header: String,
    #[serde(with = "humantime_serde")]
    request_timeout: Duration,
    accept_invalid_certs: bool,
}

impl Default for DeviceApi {
    fn default() -> Self {
        DeviceApi {
            login_path: "/logincheck".to_string(),
            logout_path: "/logout".to_string(),
            status_path: "api/v2/cmdb/system/status".to_string(),
            backup_path: "api/v2/monitor/system/config/backup?scope=global".to_string(),
            csrf_cookie: "ccsrftoken".to_string(),
            csrf_header: "X-CSRFTOKEN".to_string(),
            request_timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
        }
    }
}

impl DeviceApi {
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn logout_path(&self) -> &str {
        &self.logout_path
    }

    pub fn status_path(&self) -> &str {
        &self.status_path
    }

    pub fn backup_path(&self) -> &str {
        &self.backup_path
    }

    pub fn csrf_cookie(&self) -> &str {
        &self.csrf_cookie
    }

    pub fn csrf_header(&self) -> &str {
        &self.csrf_header
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsConfig {
    username: String,
    password: SecretString,
}

#[derive(Debug, Deserialize)]
struct DeviceConfig {
    id: String,
    url: String,
    credentials: String,
}

#[derive(Debug, Deserialize)]
pub struct Archive {
    directory: PathBuf,
    #[serde(default = "default_extension")]
    extension: String,
    key: Option<String>,
}

impl Archive {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

fn default_extension() -> String {
    "conf".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct Drift {
    device: Option<String>,
    #[serde(default)]
    ignore_line_prefixes: Vec<String>,
    #[serde(default)]
    notify_when_unchanged: bool,
}

impl Drift {
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn ignore_line_prefixes(&self) -> &[String] {
        &self.ignore_line_prefixes
    }

    pub fn notify_when_unchanged(&self) -> bool {
        self.notify_when_unchanged
    }
}

#[derive(Debug, Deserialize)]
pub struct Notification {
    from: String,
    to: String,
    #[serde(default = "default_subject")]
    subject: String,
    #[serde(default)]
    retry_attempts: usize,
    transport: TransportConfig,
}

impl Notification {
    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn retry_attempts(&self) -> usize {
        self.retry_attempts
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }
}

fn default_subject() -> String {
    "Configuration changes detected".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Smtp {
        host: String,
        #[serde(default = "default_smtp_port")]
        port: u16,
        username: Option<String>,
        password: Option<SecretString>,
        #[serde(default = "default_starttls")]
        starttls: bool,
    },
    File {
        directory: PathBuf,
    },
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                core: Core::default(),
                device_api: DeviceApi::default(),
                credentials: HashMap::from([(
                    "default".to_string(),
                    CredentialsConfig {
                        username: "admin".to_string(),
                        password: SecretString::from("secret"),
                    },
                )]),
                devices: vec![],
                archive: None,
                drift: Drift::default(),
                notification: None,
            },
        }
    }

    pub fn device(mut self, id: &str, url: &str) -> Self {
        self.config.devices.push(DeviceConfig {
            id: id.to_string(),
            url: url.to_string(),
            credentials: "default".to_string(),
        });
        self
    }

    pub fn run_deadline(mut self, deadline: Duration) -> Self {
        self.config.core.run_deadline = Some(deadline);
        self
    }

    pub fn retry_rounds(mut self, rounds: usize) -> Self {
        self.config.core.retry_rounds = rounds;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.device_api.request_timeout = timeout;
        self
    }

    pub fn backup_path(mut self, path: &str) -> Self {
        self.config.device_api.backup_path = path.to_string();
        self
    }

    pub fn ignore_line_prefix(mut self, prefix: &str) -> Self {
        self.config.drift.ignore_line_prefixes.push(prefix.to_string());
        self
    }

    pub fn notify_when_unchanged(mut self, notify: bool) -> Self {
        self.config.drift.notify_when_unchanged = notify;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("fleetwatch-{}-{}.toml", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_reads_a_toml_file_and_applies_defaults() -> Result<(), ConfigError> {
        let path = write_config(
            "load",
            r#"
            [core]
            concurrency_limit = 5
            run_deadline = "2m"

            [device_api]
            request_timeout = "3s"

            [credentials.default]
            username = "admin"
            password = "secret"

            [[devices]]
            id = "fw-1"
            url = "https://10.0.0.1"
            credentials = "default"

            [notification]
            from = "fleetwatch@example.com"
            to = "noc@example.com"
            transport = { type = "file", directory = "/tmp/mail" }
            "#,
        );

        let config = AppConfig::load(path.to_str().unwrap())?;

        assert_eq!(config.core().concurrency_limit(), 5);
        assert_eq!(config.core().run_deadline(), Some(Duration::from_secs(120)));
        assert_eq!(config.core().retry_rounds(), 0);
        assert_eq!(config.device_api().request_timeout(), Duration::from_secs(3));
        assert_eq!(config.device_api().login_path(), "/logincheck");
        assert_eq!(config.device_api().csrf_header(), "X-CSRFTOKEN");
        assert_eq!(config.notification()?.subject(), "Configuration changes detected");
        assert!(matches!(config.notification()?.transport(), TransportConfig::File { .. }));
        assert!(matches!(config.archive(), Err(ConfigError::MissingSection("archive"))));

        let endpoints = config.endpoints(&[])?;
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].credentials().username(), "admin");

        Ok(())
    }

    #[test]
    fn debug_output_hides_passwords() {
        let config = AppConfigBuilder::new().device("fw-1", "https://fw1").build();
        let transport = TransportConfig::Smtp {
            host: "smtp.example.net".to_string(),
            port: 587,
            username: Some("fleetwatch".to_string()),
            password: Some(SecretString::from("secret")),
            starttls: true,
        };

        let output = format!("{:?} {:?}", config, transport);

        assert!(output.contains("admin"));
        assert!(!output.contains("secret"));
    }

    #[test]
    fn endpoints_fails_without_devices() {
        let config = AppConfigBuilder::new().build();

        assert!(matches!(config.endpoints(&[]), Err(ConfigError::NoDevices)));
    }

    #[test]
    fn endpoints_fails_for_duplicate_devices() {
        let config = AppConfigBuilder::new().device("fw-1", "https://fw1").device("fw-1", "https://fw1b").build();

        assert!(matches!(config.endpoints(&[]), Err(ConfigError::DuplicateDevice(id)) if id == "fw-1"));
    }

    #[test]
    fn endpoints_fails_for_a_malformed_url() {
        let config = AppConfigBuilder::new().device("fw-1", "not a url").build();

        assert!(matches!(config.endpoints(&[]), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn endpoints_fails_for_unknown_credentials() {
        let mut config = AppConfigBuilder::new().device("fw-1", "https://fw1").build();
        config.devices[0].credentials = "missing".to_string();

        assert!(matches!(
            config.endpoints(&[]),
            Err(ConfigError::UnknownCredentials { reference, .. }) if reference == "missing"
        ));
    }

    #[test]
    fn endpoints_can_select_a_subset_of_the_fleet() -> Result<(), ConfigError> {
        let config = AppConfigBuilder::new()
            .device("fw-1", "https://fw1")
            .device("fw-2", "https://fw2")
            .device("fw-3", "https://fw3")
            .build();

        let endpoints = config.endpoints(&["fw-3".to_string(), "fw-1".to_string()])?;
        let ids = endpoints.iter().map(|e| e.id().as_str()).collect::<Vec<_>>();

        assert_eq!(ids, vec!["fw-1", "fw-3"]);
        assert!(matches!(config.endpoints(&["fw-9".to_string()]), Err(ConfigError::UnknownDevice(id)) if id == "fw-9"));

        Ok(())
    }
}
