use dispatch::config::{Settings, ValidationError};
use dispatch::request::Device;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

/// A device registered under a name the CLI can refer to.
#[derive(Deserialize, Debug)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(flatten)]
    pub device: Device,
}

#[derive(Deserialize, Debug, Default)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.devices {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateDevice(entry.name.clone()));
            }
        }

        Ok(())
    }

    pub fn sentry_dsn(&self) -> Option<&str> {
        self.common
            .logging
            .as_ref()
            .and_then(|logging| logging.sentry_dsn.as_deref())
            .filter(|dsn| !dsn.is_empty())
    }

    /// Devices selected by name, or every configured device when `names` is empty.
    pub fn select_devices(&self, names: &[String]) -> Result<Vec<Device>, ConfigError> {
        if names.is_empty() {
            return Ok(self.devices.iter().map(|d| d.device.clone()).collect());
        }

        names
            .iter()
            .map(|name| {
                self.devices
                    .iter()
                    .find(|d| &d.name == name)
                    .map(|d| d.device.clone())
                    .ok_or_else(|| ConfigError::UnknownDevice(name.clone()))
            })
            .collect()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] ValidationError),
    #[error("device {0} is configured more than once")]
    DuplicateDevice(String),
    #[error("no device named {0}")]
    UnknownDevice(String),
}
