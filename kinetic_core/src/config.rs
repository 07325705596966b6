//! Configuration file support for Kinetic.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/kinetic/config.toml`.
//! Every field has a default, so a partial (or missing) file is fine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest duration any window, lookback or projection may span (one year)
pub const MAX_SPAN_HOURS: i64 = 24 * 365;

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub pk: PkConfig,

    #[serde(default)]
    pub timeline: TimelineConfig,

    #[serde(default)]
    pub exclusion: ExclusionConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Trailing dose window considered "current"
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_hours")]
    pub hours: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            hours: default_window_hours(),
        }
    }
}

/// Pharmacokinetic defaults used when the catalog has no measured values
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PkConfig {
    #[serde(default = "default_peak_minutes")]
    pub default_peak_minutes: f64,

    #[serde(default = "default_half_life_minutes")]
    pub default_half_life_minutes: f64,

    /// Upper bound on the summed concentration of one substance
    #[serde(default = "default_aggregate_cap")]
    pub aggregate_cap: f64,
}

impl Default for PkConfig {
    fn default() -> Self {
        Self {
            default_peak_minutes: default_peak_minutes(),
            default_half_life_minutes: default_half_life_minutes(),
            aggregate_cap: default_aggregate_cap(),
        }
    }
}

/// Timeline sweep configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i64,

    #[serde(default = "default_window_hours")]
    pub lookback_hours: i64,

    #[serde(default = "default_projection_hours")]
    pub projection_hours: i64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            lookback_hours: default_window_hours(),
            projection_hours: default_projection_hours(),
        }
    }
}

/// Exclusion zone engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExclusionConfig {
    /// Only surface a zone when the target substance was also dosed in the window
    #[serde(default = "default_require_target_dosed")]
    pub require_target_dosed: bool,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            require_target_dosed: default_require_target_dosed(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("kinetic")
}

fn default_window_hours() -> i64 {
    24
}

fn default_peak_minutes() -> f64 {
    60.0
}

fn default_half_life_minutes() -> f64 {
    240.0
}

fn default_aggregate_cap() -> f64 {
    150.0
}

fn default_interval_minutes() -> i64 {
    15
}

fn default_projection_hours() -> i64 {
    4
}

fn default_require_target_dosed() -> bool {
    true
}

impl EngineConfig {
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
        let config: EngineConfig = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("kinetic").join("config.toml")
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

    /// Reject durations and bounds that would make the engines meaningless
    pub fn validate(&self) -> Result<()> {
        if self.window.hours <= 0 || self.window.hours > MAX_SPAN_HOURS {
            return Err(Error::Config(format!(
                "window.hours must be between 1 and {}, got {}",
                MAX_SPAN_HOURS, self.window.hours
            )));
        }
        if self.pk.default_peak_minutes <= 0.0 || self.pk.default_half_life_minutes <= 0.0 {
            return Err(Error::Config(
                "pk defaults for peak and half-life must be positive".into(),
            ));
        }
        if self.pk.aggregate_cap <= 0.0 {
            return Err(Error::Config("pk.aggregate_cap must be positive".into()));
        }
        crate::active_state::TimelineOptions::from(&self.timeline).validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.window.hours, 24);
        assert_eq!(config.pk.default_peak_minutes, 60.0);
        assert_eq!(config.pk.default_half_life_minutes, 240.0);
        assert_eq!(config.pk.aggregate_cap, 150.0);
        assert_eq!(config.timeline.interval_minutes, 15);
        assert_eq!(config.timeline.projection_hours, 4);
        assert!(config.exclusion.require_target_dosed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.pk.aggregate_cap, parsed.pk.aggregate_cap);
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[exclusion]
require_target_dosed = false

[timeline]
interval_minutes = 30
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.exclusion.require_target_dosed);
        assert_eq!(config.timeline.interval_minutes, 30);
        assert_eq!(config.timeline.lookback_hours, 24); // default
        assert_eq!(config.pk.default_half_life_minutes, 240.0); // default
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = EngineConfig::default();
        config.timeline.interval_minutes = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unbounded_spans() {
        let mut config = EngineConfig::default();
        config.window.hours = MAX_SPAN_HOURS + 1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EngineConfig::default();
        config.timeline.lookback_hours = i64::MAX;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EngineConfig::default();
        config.window.hours = MAX_SPAN_HOURS;
        config.timeline.projection_hours = MAX_SPAN_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_and_save_to() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = EngineConfig::default();
        config.window.hours = 48;
        config.save_to(&path).unwrap();

        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded.window.hours, 48);
    }
}
