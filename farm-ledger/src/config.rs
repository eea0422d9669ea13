use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use farm_core::db::DbConfig;
use farm_core::reconciliation::EngineConfig;
use farm_core::reconciliation::engine::DEFAULT_TRANSACTION_TIMEOUT;
use serde::{Deserialize, Serialize};

/// Contents of `farm-ledger.toml`. Every key is optional.
///
/// ```toml
/// log_level = "info"
///
/// [database]
/// backend = "sqlite"
/// connection_string = "farm.db"
///
/// [engine]
/// transaction_timeout_ms = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DbConfig,
    pub engine: EngineSection,
    /// Used when `RUST_LOG` is not set.
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub transaction_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DbConfig {
                backend: "sqlite".to_string(),
                connection_string: "farm.db".to_string(),
            },
            engine: EngineSection::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: u64::try_from(DEFAULT_TRANSACTION_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse configuration")?;
        config.engine_config()?;
        Ok(config)
    }

    /// Read `path`, or fall back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// A zero timeout would abandon every transaction before it starts.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        if self.engine.transaction_timeout_ms == 0 {
            bail!("engine.transaction_timeout_ms must be greater than zero");
        }
        Ok(EngineConfig {
            transaction_timeout: Duration::from_millis(self.engine.transaction_timeout_ms),
        })
    }
}
