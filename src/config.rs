use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::Operator;
use crate::{clog_debug, clog_warn, Error, Result};

/// Service configuration.
///
/// Resolved in three layers: `~/.calcflow/calcflow.toml`, then environment
/// variables, then command-line flags (applied by the binary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the orchestrator listens on.
    pub port: u16,
    /// How long a dispatched task may stay unreported before it is requeued.
    pub lease_ms: u64,
    /// Period of the lease expiry sweep.
    pub sweep_interval_ms: u64,
    pub time_addition_ms: u64,
    pub time_subtraction_ms: u64,
    pub time_multiplication_ms: u64,
    pub time_division_ms: u64,
    /// Number of concurrent worker loops run by `calcflow agent`.
    pub computing_power: usize,
    /// Base URL the agent pulls tasks from.
    pub orchestrator_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            lease_ms: 30_000,
            sweep_interval_ms: 1_000,
            time_addition_ms: 1_000,
            time_subtraction_ms: 1_000,
            time_multiplication_ms: 1_000,
            time_division_ms: 1_000,
            computing_power: 4,
            orchestrator_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

/// Simulated per-operator execution times handed to workers with each task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimings {
    pub addition: Duration,
    pub subtraction: Duration,
    pub multiplication: Duration,
    pub division: Duration,
}

impl OperationTimings {
    /// Timings of zero for every operator.
    pub fn instant() -> Self {
        Self {
            addition: Duration::ZERO,
            subtraction: Duration::ZERO,
            multiplication: Duration::ZERO,
            division: Duration::ZERO,
        }
    }

    pub fn for_operator(&self, operator: Operator) -> Duration {
        match operator {
            Operator::Add => self.addition,
            Operator::Subtract => self.subtraction,
            Operator::Multiply => self.multiplication,
            Operator::Divide => self.division,
        }
    }
}

impl Default for OperationTimings {
    fn default() -> Self {
        Config::default().timings()
    }
}

impl Config {
    pub fn calcflow_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".calcflow"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::calcflow_dir()?.join("calcflow.toml"))
    }

    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) => Self::load_from(&path)?,
            Err(Error::NoHomeDir) => {
                clog_debug!("No home directory, using default config");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        clog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            clog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        clog_debug!(
            "Config loaded: port={}, lease_ms={}, computing_power={}",
            config.port,
            config.lease_ms,
            config.computing_power
        );
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse_into<T: std::str::FromStr>(key: &str, raw: Option<String>, slot: &mut T) {
            if let Some(raw) = raw {
                match raw.trim().parse::<T>() {
                    Ok(value) => *slot = value,
                    Err(_) => clog_warn!("Ignoring invalid value {:?} for {}", raw, key),
                }
            }
        }

        parse_into("PORT", lookup("PORT"), &mut self.port);
        parse_into("LEASE_MS", lookup("LEASE_MS"), &mut self.lease_ms);
        parse_into(
            "SWEEP_INTERVAL_MS",
            lookup("SWEEP_INTERVAL_MS"),
            &mut self.sweep_interval_ms,
        );
        parse_into(
            "TIME_ADDITION_MS",
            lookup("TIME_ADDITION_MS"),
            &mut self.time_addition_ms,
        );
        parse_into(
            "TIME_SUBTRACTION_MS",
            lookup("TIME_SUBTRACTION_MS"),
            &mut self.time_subtraction_ms,
        );
        parse_into(
            "TIME_MULTIPLICATIONS_MS",
            lookup("TIME_MULTIPLICATIONS_MS"),
            &mut self.time_multiplication_ms,
        );
        parse_into(
            "TIME_DIVISIONS_MS",
            lookup("TIME_DIVISIONS_MS"),
            &mut self.time_division_ms,
        );
        parse_into(
            "COMPUTING_POWER",
            lookup("COMPUTING_POWER"),
            &mut self.computing_power,
        );
        if let Some(url) = lookup("ORCHESTRATOR_URL") {
            self.orchestrator_url = url.trim_end_matches('/').to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lease_ms == 0 {
            return Err(Error::Config("lease_ms must be greater than zero".to_string()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(Error::Config(
                "sweep_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.computing_power == 0 {
            return Err(Error::Config(
                "computing_power must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                clog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        clog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn timings(&self) -> OperationTimings {
        OperationTimings {
            addition: Duration::from_millis(self.time_addition_ms),
            subtraction: Duration::from_millis(self.time_subtraction_ms),
            multiplication: Duration::from_millis(self.time_multiplication_ms),
            division: Duration::from_millis(self.time_division_ms),
        }
    }
}
