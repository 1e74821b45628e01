//! Engine Configuration
//!
//! Tunables for the ambiance engine and the narration transport. Every field
//! has a default matching the shipped client, so a partial JSON document only
//! needs to name the values it changes.

use crate::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default sample rate for the ambiance runtime
pub const DEFAULT_AMBIANCE_SAMPLE_RATE: u32 = 44_100;

/// Sample rate of the speech payloads returned by the narration service
pub const DEFAULT_NARRATION_SAMPLE_RATE: u32 = 24_000;

/// Ambiance engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of the ambiance runtime in Hz
    pub sample_rate: u32,
    /// Fixed master output level; keeps ambiance under the narration
    pub master_gain: f32,
    /// Length of a soundscape cross-fade in seconds
    pub crossfade_secs: f64,
    /// Delay after a fade-out completes before its voices are torn down
    pub teardown_grace_secs: f64,
    /// Fade-out length used by `stop_all`
    pub stop_fade_secs: f64,
    /// Delay after `stop_all` before its voices are torn down
    pub stop_grace_secs: f64,
    /// Level of the dedicated one-shot gain for sound effects
    pub sfx_gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: DEFAULT_AMBIANCE_SAMPLE_RATE,
            master_gain: 0.25,
            crossfade_secs: 3.0,
            teardown_grace_secs: 0.1,
            stop_fade_secs: 0.5,
            stop_grace_secs: 1.0,
            sfx_gain: 0.4,
        }
    }
}

impl EngineConfig {
    /// Check ranges; called by [`AudioConfig::validate`]
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::ConfigError(
                "ambiance sample_rate must be positive".into(),
            ));
        }
        for (name, value) in [
            ("crossfade_secs", self.crossfade_secs),
            ("teardown_grace_secs", self.teardown_grace_secs),
            ("stop_fade_secs", self.stop_fade_secs),
            ("stop_grace_secs", self.stop_grace_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AudioError::ConfigError(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        for (name, value) in [("master_gain", self.master_gain), ("sfx_gain", self.sfx_gain)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AudioError::ConfigError(format!(
                    "{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Narration transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Sample rate of the narration runtime and of decoded speech
    pub sample_rate: u32,
    /// Channel count of the speech payload
    pub channels: u16,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        NarrationConfig {
            sample_rate: DEFAULT_NARRATION_SAMPLE_RATE,
            channels: 1,
        }
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Ambiance engine settings
    pub ambiance: EngineConfig,
    /// Narration transport settings
    pub narration: NarrationConfig,
}

impl AudioConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AudioConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.ambiance.validate()?;
        if self.narration.sample_rate == 0 || self.narration.channels == 0 {
            return Err(AudioError::ConfigError(
                "narration sample_rate and channels must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_client() {
        let cfg = AudioConfig::default();
        assert_eq!(cfg.ambiance.sample_rate, 44_100);
        assert_relative_eq!(cfg.ambiance.master_gain, 0.25);
        assert_relative_eq!(cfg.ambiance.crossfade_secs, 3.0);
        assert_relative_eq!(cfg.ambiance.teardown_grace_secs, 0.1);
        assert_eq!(cfg.narration.sample_rate, 24_000);
        assert_eq!(cfg.narration.channels, 1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = AudioConfig::from_json_str(r#"{ "ambiance": { "master_gain": 0.5 } }"#)
            .expect("valid config");
        assert_relative_eq!(cfg.ambiance.master_gain, 0.5);
        assert_relative_eq!(cfg.ambiance.crossfade_secs, 3.0);
        assert_eq!(cfg.narration, NarrationConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(AudioConfig::from_json_str(r#"{ "ambiance": { "master_gain": 1.5 } }"#).is_err());
        assert!(AudioConfig::from_json_str(r#"{ "ambiance": { "crossfade_secs": -1.0 } }"#).is_err());
        assert!(AudioConfig::from_json_str(r#"{ "narration": { "sample_rate": 0 } }"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audio.json");
        std::fs::write(&path, r#"{ "narration": { "channels": 2 } }"#).expect("write");
        let cfg = AudioConfig::from_file(&path).expect("load");
        assert_eq!(cfg.narration.channels, 2);
    }
}
