use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(io::Error),
    #[error(transparent)]
    Toml(toml::de::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub dispatch: Dispatch,
    pub pool: Pool,
    pub interpolation: Interpolation,
}

impl Config {
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::open(path).map_err(ConfigError::Io)?;

        let mut buf = String::new();
        file.read_to_string(&mut buf).map_err(ConfigError::Io)?;

        buf.parse()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Dispatch {
    /// Milliseconds between two dispatch passes.
    ///
    /// Defaults to `250`.
    pub interval_ms: u64,
    /// Milliseconds to wait after a scene was loaded before updates are dispatched.
    ///
    /// Defaults to `1000`.
    pub settle_delay_ms: u64,
}

impl Dispatch {
    pub fn interval(&self) -> Duration {
        // A zero period makes `tokio::time::interval` panic.
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            settle_delay_ms: 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pool {
    /// Should update records be recycled?
    ///
    /// Defaults to `true`.
    pub enabled: bool,
}

impl Default for Pool {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Interpolation {
    /// The expected number of milliseconds between two snapshots of the same entity.
    ///
    /// Defaults to `50`.
    pub update_interval_ms: u64,
}

impl Interpolation {
    /// Returns the expected snapshot interval in seconds.
    pub fn update_interval(&self) -> f64 {
        Duration::from_millis(self.update_interval_ms).as_secs_f64()
    }
}

impl Default for Interpolation {
    fn default() -> Self {
        Self {
            update_interval_ms: 50,
        }
    }
}
