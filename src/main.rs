use crate::app_config::{AppConfig, ConfigError};
use crate::backup::DirectoryArchive;
use crate::cli::{Cli, Command};
use crate::device::{HttpConnector, Operation};
use crate::notify::{Dispatcher, MailTransport, Recipient};
use crate::orchestrator::Orchestrator;
use clap::Parser;
use std::sync::Arc;
use tracing::{Level, info};

mod app_config;
mod backup;
mod cli;
mod device;
mod domain;
mod drift;
mod fleet;
mod notify;
mod orchestrator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Arc::new(AppConfig::load(&cli.config)?);
    info!("✅  Loaded configuration");

    let client = device::new_client(config.device_api())?;
    let connector = Arc::new(HttpConnector::new(client, Arc::new(config.device_api().clone())));
    let concurrency_limit = cli.concurrency.unwrap_or(config.core().concurrency_limit());
    let orchestrator = Orchestrator::new(config.clone(), connector, concurrency_limit);

    let summary = match cli.command {
        Command::Poll { devices, resources } => {
            let endpoints = config.endpoints(&devices)?;
            let operations = if resources.is_empty() {
                vec![Operation::get(config.device_api().status_path())]
            } else {
                resources.into_iter().map(Operation::get).collect()
            };

            orchestrator.poll(endpoints, operations).await?
        }
        Command::Drift { device, force_notify } => {
            let device = device
                .or_else(|| config.drift().device().map(str::to_string))
                .ok_or(ConfigError::MissingDriftDevice)?;
            let endpoint = config
                .endpoints(std::slice::from_ref(&device))?
                .into_iter()
                .next()
                .ok_or(ConfigError::UnknownDevice(device))?;

            let archive = DirectoryArchive::new(config.archive()?)?;
            let notification = config.notification()?;
            let transport = Arc::new(MailTransport::new(notification.transport())?);
            let dispatcher = Dispatcher::new(transport, Recipient::from(notification), notification.retry_attempts());
            info!("✅  Initialized archive and notifications");

            orchestrator.check_drift(endpoint, &archive, &dispatcher, force_notify).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
