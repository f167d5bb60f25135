use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Which cost metric the menu bar shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    /// Today's ledger cost total.
    #[default]
    Today,
    /// Cost of session blocks started within the trailing 5 hours.
    SessionWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Both,
    Percentage,
    Cost,
}

/// Configured notification thresholds. Carried through the configuration
/// surface but not wired into status bucketing, which uses the fixed
/// constants in `core::models::usage` (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: u8,
    pub critical: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 70,
            critical: 90,
        }
    }
}

/// Immutable-per-update configuration record threading cost-source and
/// display mode into the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub cost_source: CostSource,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Partial configuration update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub cost_source: Option<CostSource>,
    pub display_mode: Option<DisplayMode>,
    pub thresholds: Option<Thresholds>,
}

impl Configuration {
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(cost_source) = update.cost_source {
            self.cost_source = cost_source;
        }
        if let Some(display_mode) = update.display_mode {
            self.display_mode = display_mode;
        }
        if let Some(thresholds) = update.thresholds {
            self.thresholds = thresholds;
        }
    }

    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("usagebar").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Configuration = toml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.thresholds.warning >= self.thresholds.critical {
            issues.push(format!(
                "thresholds.warning ({}) must be below thresholds.critical ({})",
                self.thresholds.warning, self.thresholds.critical
            ));
        }
        if self.thresholds.critical > 100 {
            issues.push(format!(
                "thresholds.critical ({}) must be at most 100",
                self.thresholds.critical
            ));
        }
        issues
    }
}
