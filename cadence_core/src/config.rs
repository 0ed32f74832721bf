//! Configuration file support for Cadence.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/cadence/config.toml`.

use crate::cue::{CueMode, CueSettings};
use crate::{Error, Result, UserIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub cues: CueSettings,
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

/// Signed-in rider; no id means signed out
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserConfig {
    /// The configured identity; the display name falls back to the id
    pub fn identity(&self) -> Option<UserIdentity> {
        let id = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        let display_name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(id);

        Some(UserIdentity {
            id: id.to_string(),
            display_name: display_name.to_string(),
        })
    }
}

/// Playback defaults
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub cue_mode: CueMode,
}

fn home_fallback(relative: &str) -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(relative))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_fallback(".local/share"));
    base.join("cadence")
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

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_fallback(".config"));
        base.join("cadence").join("config.toml")
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

    fn validate(&self) -> Result<()> {
        let tones = [
            self.cues.countdown_tone_hz,
            self.cues.transition_tone_hz,
            self.cues.countdown_tone_seconds,
            self.cues.transition_tone_seconds,
        ];
        if tones.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(Error::Config(
                "cue tone frequencies and lengths must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.playback.cue_mode, CueMode::Beep);
        assert_eq!(config.cues.countdown_window, 3);
        assert_eq!(config.cues.countdown_tone_hz, 440.0);
        assert!(config.user.identity().is_none());
        assert!(config.data.data_dir.ends_with("cadence"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.user.id = Some("u1".into());
        config.playback.cue_mode = CueMode::Voice;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.playback.cue_mode, CueMode::Voice);
        assert_eq!(parsed.user.id.as_deref(), Some("u1"));
        assert_eq!(parsed.cues, config.cues);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[playback]
cue_mode = "mute"

[cues]
countdown_window = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.playback.cue_mode, CueMode::Mute);
        assert_eq!(config.cues.countdown_window, 5);
        assert_eq!(config.cues.transition_tone_hz, 880.0);
    }

    #[test]
    fn test_identity_name_falls_back_to_id() {
        let user = UserConfig {
            id: Some("rider-7".into()),
            name: None,
        };
        let identity = user.identity().unwrap();
        assert_eq!(identity.display_name, "rider-7");

        let blank = UserConfig {
            id: Some("  ".into()),
            name: Some("Ana".into()),
        };
        assert!(blank.identity().is_none());
    }

    #[test]
    fn test_load_rejects_bad_tones() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[cues]\ncountdown_tone_hz = 0.0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.user.name = Some("Ana".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.user.name.as_deref(), Some("Ana"));
    }
}
