//! Process configuration, loaded once from a TOML file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    /// APRS-IS upstream; omit to run serial-only.
    pub aprsis: Option<AprsIsConfig>,
    /// KISS TNC serial port; omit to run network-only.
    pub serial: Option<SerialConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_dedup_sweep_secs")]
    pub dedup_sweep_secs: u64,
    /// Path to the notifier side-car JSON file.
    pub notifiers: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            dedup_window_secs: default_dedup_window_secs(),
            dedup_sweep_secs: default_dedup_sweep_secs(),
            notifiers: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AprsIsConfig {
    #[serde(default = "default_server")]
    pub server: String,
    pub callsign: String,
    pub passcode: String,
    /// Optional server-side filter expression.
    pub filter: Option<String>,
    /// Optional raw-line audit log path.
    pub rawlog: Option<String>,
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_bus_capacity() -> usize {
    100
}
fn default_dedup_window_secs() -> u64 {
    600
}
fn default_dedup_sweep_secs() -> u64 {
    60
}
fn default_server() -> String {
    "second.aprs.net:14580".to_string()
}
fn default_watchdog_secs() -> u64 {
    300
}
fn default_backoff_secs() -> u64 {
    1
}
fn default_baud() -> u32 {
    57600
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Startup preconditions; anything failing here is fatal.
    pub fn validate(&self) -> Result<()> {
        if let Some(aprsis) = &self.aprsis {
            if aprsis.callsign.trim().is_empty() {
                anyhow::bail!("aprsis.callsign is required");
            }
            if aprsis.passcode.trim().is_empty() {
                anyhow::bail!("aprsis.passcode is required (use -1 for receive-only)");
            }
            if aprsis.watchdog_secs == 0 {
                anyhow::bail!("aprsis.watchdog_secs must be positive");
            }
        }
        if self.general.bus_capacity < 10 {
            anyhow::bail!("bus_capacity too small: {}", self.general.bus_capacity);
        }
        if self.general.dedup_window_secs == 0 {
            anyhow::bail!("dedup_window_secs must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [aprsis]
            callsign = "N0CALL"
            passcode = "-1"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        let aprsis = config.aprsis.unwrap();
        assert_eq!(aprsis.server, "second.aprs.net:14580");
        assert_eq!(aprsis.watchdog_secs, 300);
        assert!(config.serial.is_none());
        assert_eq!(config.general.bus_capacity, 100);
    }

    #[test]
    fn test_full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [general]
            bus_capacity = 250
            dedup_window_secs = 120
            notifiers = "notify.json"

            [aprsis]
            server = "rotate.aprs2.net:14580"
            callsign = "N0CALL"
            passcode = "12345"
            filter = "r/47.6/-122.3/100"
            rawlog = "/var/log/aprsgate.raw"
            watchdog_secs = 120

            [serial]
            device = "/dev/ttyUSB0"
            baud = 9600
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.serial.unwrap().baud, 9600);
        assert_eq!(config.general.notifiers.as_deref(), Some("notify.json"));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config: Config = toml::from_str(
            r#"
            [aprsis]
            callsign = ""
            passcode = "-1"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tiny_bus_rejected() {
        let config: Config = toml::from_str(
            r#"
            [general]
            bus_capacity = 2
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
