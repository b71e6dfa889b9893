//! Configuration loading from caseflow.toml.

use crate::error::{Error, Result};
use policy::RolePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Background sweep cadence.
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Role/department default rules; falls back to the built-in table.
    #[serde(default)]
    pub policy: Option<RolePolicy>,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path. Overridable with `CASEFLOW_DB`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    /// Seconds between periodic expiry sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("caseflow.db")
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(toml).map_err(|e| Error::Config(e.to_string()))?;
        if let Ok(db) = std::env::var("CASEFLOW_DB") {
            config.store.path = PathBuf::from(db);
        }
        Ok(config)
    }

    /// The effective role-default table.
    pub fn rules(&self) -> RolePolicy {
        self.policy.clone().unwrap_or_else(RolePolicy::standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.store.path, PathBuf::from("caseflow.db"));
        assert_eq!(config.sweep.interval_secs, 300);
    }

    #[test]
    fn parse_overrides() {
        let toml = r#"
[store]
path = "/var/lib/caseflow/cases.db"

[sweep]
interval_secs = 60

[policy]
export_departments = ["AUDIT"]
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.sweep.interval_secs, 60);
        assert!(config.rules().export_departments.contains(&"AUDIT".to_string()));
    }
}
