//! Configuration file support for ironlog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/ironlog/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub progression: ProgressionConfig,

    #[serde(default)]
    pub records: RecordsConfig,

    #[serde(default)]
    pub recommendation: RecommendationConfig,

    #[serde(default)]
    pub seeding: SeedingConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
        }
    }
}

impl DataConfig {
    /// Full path of the SQLite database inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

/// Leveling and heat-map parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Experience required to go from level 1 to level 2
    #[serde(default = "default_base_experience")]
    pub base_experience: f64,

    /// Multiplier applied to the requirement on every level-up
    #[serde(default = "default_level_growth")]
    pub level_growth: f64,

    /// Days after which a body area is fully cold on the heat map
    #[serde(default = "default_heat_decay_days")]
    pub heat_decay_days: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_experience: default_base_experience(),
            level_growth: default_level_growth(),
            heat_decay_days: default_heat_decay_days(),
        }
    }
}

/// What happens to a personal record once a better one is set
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordHistory {
    /// Only the current best per (exercise, kind) is kept
    #[default]
    Discard,
    /// Superseded records stay in the store, flagged as not current
    Retain,
}

/// Personal record configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RecordsConfig {
    #[serde(default)]
    pub history: RecordHistory,
}

/// Recommendation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default = "default_diverse_count")]
    pub diverse_count: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            diverse_count: default_diverse_count(),
        }
    }
}

/// System template seeding configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedingConfig {
    #[serde(default = "default_seed_system_templates")]
    pub seed_system_templates: bool,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            seed_system_templates: default_seed_system_templates(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("ironlog")
}

fn default_database_file() -> String {
    "ironlog.db".into()
}

fn default_base_experience() -> f64 {
    1000.0
}

fn default_level_growth() -> f64 {
    1.5
}

fn default_heat_decay_days() -> u32 {
    7
}

fn default_diverse_count() -> usize {
    3
}

fn default_seed_system_templates() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject parameter combinations the progression engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.progression.base_experience > 0.0) {
            return Err(Error::Config(format!(
                "progression.base_experience must be positive, got {}",
                self.progression.base_experience
            )));
        }
        if !(self.progression.level_growth > 1.0 && self.progression.level_growth.is_finite()) {
            return Err(Error::Config(format!(
                "progression.level_growth must be greater than 1.0, got {}",
                self.progression.level_growth
            )));
        }
        if self.progression.heat_decay_days == 0 {
            return Err(Error::Config(
                "progression.heat_decay_days must be at least 1".into(),
            ));
        }
        if self.data.database_file.trim().is_empty() {
            return Err(Error::Config("data.database_file must not be empty".into()));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("ironlog").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
