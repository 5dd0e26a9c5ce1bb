//! Player configuration.
//!
//! Everything that is fixed for the lifetime of a session (sample rate,
//! output sample format, callback buffer size) and the locations used to
//! resolve assets. Stored as JSON so a deployment can override any subset
//! of the defaults.

use crate::audio::SampleFormat;
use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Number of interleaved output channels. Playback is always stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Default output sample rate (44.1 kHz).
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of frames requested per sink callback.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Longest release tail accepted after the last event, in milliseconds.
pub const MAX_RELEASE_TAIL_MS: u64 = 60_000;

/// Options resolved once at setup.
///
/// Missing fields fall back to their defaults when deserializing, so a
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,

    /// Sample format handed to the audio output.
    pub sample_format: SampleFormat,

    /// Frames rendered per sink callback.
    pub buffer_size: usize,

    /// Directory searched first for assets.
    pub primary_dir: PathBuf,

    /// Directory searched when the asset is missing from `primary_dir`.
    pub fallback_dir: PathBuf,

    /// File extension appended to asset names (without the dot).
    pub extension: String,

    /// SoundFont used by the synthesizer.
    pub soundfont: PathBuf,

    /// Asset played when none is named on the command line.
    pub default_asset: String,

    /// How long the sink keeps running after the last event so that
    /// releases can ring out.
    pub release_tail_ms: u64,

    /// Poll period of the control thread while waiting for completion.
    pub poll_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            sample_format: SampleFormat::F32,
            buffer_size: DEFAULT_BUFFER_SIZE,
            primary_dir: PathBuf::from("cache/client/songs"),
            fallback_dir: PathBuf::from("cache/client/jingles"),
            extension: "mid".to_string(),
            soundfont: PathBuf::from("SCC1_Florestan.sf2"),
            default_asset: "scape_main".to_string(),
            release_tail_ms: 1000,
            poll_interval_ms: 100,
        }
    }
}

impl PlayerConfig {
    /// Checks the values that would make a session impossible to run.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] for a zero sample rate or buffer size,
    /// or a release tail longer than [`MAX_RELEASE_TAIL_MS`].
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PlayerError::Config("sample_rate must be positive".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(PlayerError::Config("buffer_size must be positive".to_string()));
        }
        if self.release_tail_ms > MAX_RELEASE_TAIL_MS {
            return Err(PlayerError::Config(format!(
                "release_tail_ms must be at most {}, got {}",
                MAX_RELEASE_TAIL_MS, self.release_tail_ms
            )));
        }
        Ok(())
    }

    /// Parses a configuration from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PlayerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PlayerError::Config(e.to_string()))
    }

    /// Loads a configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a JSON config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Writes the configuration to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.sample_format, SampleFormat::F32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            PlayerConfig::from_json(r#"{ "sample_format": "i16", "buffer_size": 512 }"#).unwrap();
        assert_eq!(config.sample_format, SampleFormat::I16);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.default_asset, "scape_main");
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let err = PlayerConfig::from_json(r#"{ "sample_rate": 0 }"#).unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));
    }

    #[test]
    fn test_rejects_unbounded_release_tail() {
        let err = PlayerConfig::from_json(r#"{ "release_tail_ms": 1000000000000000 }"#)
            .unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));

        let config = PlayerConfig {
            release_tail_ms: MAX_RELEASE_TAIL_MS,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");

        let config = PlayerConfig {
            sample_rate: 48000,
            release_tail_ms: 250,
            ..PlayerConfig::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = PlayerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
