//! Configuration management for the LPG stock ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with LPG prefix and `__` separators
//!    (`LPG__LEDGER__DISCREPANCY_THRESHOLD=5`)

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::DEFAULT_DISCREPANCY_THRESHOLD;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Reconstruction and reconciliation settings
    pub ledger: LedgerConfig,

    /// Stock level alerting
    pub alerts: AlertsConfig,

    /// Movement file replayed by the CLI
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Absolute écart, in bottles, above which a count is reported
    pub discrepancy_threshold: u32,

    /// Refold only the movements after the last count when a movement is
    /// appended after it
    pub checkpoint_replay: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Stock at or below this level is reported as low
    pub low_stock_threshold: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InputConfig {
    pub movements_path: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("LPG_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self::build(environment, Self::env_overrides())
    }

    fn env_overrides() -> Environment {
        Environment::with_prefix("LPG").separator("__").try_parsing(true)
    }

    fn build(environment: String, overrides: Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("ledger.discrepancy_threshold", i64::from(DEFAULT_DISCREPANCY_THRESHOLD))?
            .set_default("ledger.checkpoint_replay", false)?
            .set_default("alerts.low_stock_threshold", 100)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (LPG__ prefix)
            .add_source(overrides)
            .build()?;

        config.try_deserialize()
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            discrepancy_threshold: DEFAULT_DISCREPANCY_THRESHOLD,
            checkpoint_replay: false,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 100,
        }
    }
}
