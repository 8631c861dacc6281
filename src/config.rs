use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Tunable game constants, loadable from TOML.
///
/// Missing keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Level progress gained per cascade; a level completes at 1.0.
    pub energy_per_cascade: f32,
    /// Length of a level in seconds.
    pub level_time_seconds: u32,
    pub base_experience: u32,
    pub experience_per_level: u32,
    pub bonus_energy_per_cascade: u32,
    /// How long the Frozen Hourglass stops the timer.
    pub freeze_duration_seconds: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            energy_per_cascade: 0.08,
            level_time_seconds: 100,
            base_experience: 120,
            experience_per_level: 30,
            bonus_energy_per_cascade: 3,
            freeze_duration_seconds: 15,
        }
    }
}

impl GameConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: GameConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.energy_per_cascade > 0.0 && self.energy_per_cascade <= 1.0) {
            return Err(ConfigError::Validation(
                "energy_per_cascade must be in (0, 1]".into(),
            ));
        }
        if self.level_time_seconds == 0 {
            return Err(ConfigError::Validation(
                "level_time_seconds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GameConfig = toml::from_str("level_time_seconds = 45\n").unwrap();
        assert_eq!(config.level_time_seconds, 45);
        assert_eq!(config.base_experience, 120);
        assert!((config.energy_per_cascade - 0.08).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = GameConfig {
            energy_per_cascade: 0.0,
            ..GameConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = GameConfig {
            level_time_seconds: 0,
            ..GameConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("rune_cascade_config_{}.toml", std::process::id()));
        std::fs::write(&path, "energy_per_cascade = 0.25\nfreeze_duration_seconds = 5\n").unwrap();
        let config = GameConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!((config.energy_per_cascade - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.freeze_duration_seconds, 5);
    }

    #[test]
    fn test_load_invalid_toml() {
        let path = std::env::temp_dir().join(format!("rune_cascade_bad_{}.toml", std::process::id()));
        std::fs::write(&path, "energy_per_cascade = \"lots\"\n").unwrap();
        let result = GameConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let path = std::env::temp_dir().join("rune_cascade_definitely_missing.toml");
        assert_eq!(GameConfig::load_or_default(&path).unwrap(), GameConfig::default());
    }
}
