use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file, with or without extension
    #[arg(short = 'f', long, env = "FLEETWATCH_CONFIG", default_value = "config")]
    pub config: String,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Maximum number of devices handled at the same time, overrides `core.concurrency_limit`
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Fetch one or more resources from every device
    Poll {
        /// Only poll these devices, may be repeated
        #[arg(short, long = "device")]
        devices: Vec<String>,

        /// API paths to fetch, defaults to the system status
        #[arg(short, long = "resource")]
        resources: Vec<String>,
    },
    /// Compare the archived backup of a device with its running configuration
    Drift {
        /// Device to check, overrides `drift.device`
        #[arg(short, long)]
        device: Option<String>,

        /// Send a notification even when nothing changed
        #[arg(long)]
        force_notify: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_poll_with_filters() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "fleetwatch",
            "--config",
            "fleet.toml",
            "-c",
            "8",
            "poll",
            "--device",
            "fw-1",
            "--device",
            "fw-2",
            "--resource",
            "api/v2/monitor/system/interface",
        ])?;

        assert_eq!(cli.config, "fleet.toml");
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(
            cli.command,
            Command::Poll {
                devices: vec!["fw-1".to_string(), "fw-2".to_string()],
                resources: vec!["api/v2/monitor/system/interface".to_string()],
            }
        );

        Ok(())
    }

    #[test]
    fn parses_a_forced_drift_check() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["fleetwatch", "-v", "drift", "--device", "fw-edge-01", "--force-notify"])?;

        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Command::Drift {
                device: Some("fw-edge-01".to_string()),
                force_notify: true,
            }
        );

        Ok(())
    }

    #[test]
    fn device_is_an_option_of_the_subcommand() {
        assert!(Cli::try_parse_from(["fleetwatch", "--device", "fw-1", "poll"]).is_err());
        assert!(Cli::try_parse_from(["fleetwatch", "--device", "fw-1", "drift"]).is_err());
    }

    #[test]
    fn requires_a_command() {
        assert!(Cli::try_parse_from(["fleetwatch"]).is_err());
    }

    #[test]
    fn rejects_a_non_numeric_concurrency() {
        assert!(Cli::try_parse_from(["fleetwatch", "--concurrency", "many", "poll"]).is_err());
    }
}
