use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub frame: FrameConfig,
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Requested output rate; the device may override it when opened.
    pub sample_rate: u32,
    /// Time constant in seconds of every exponential gain approach.
    pub fade_time_constant: f64,
    /// Time a released bus is given to fade out before it is disconnected.
    pub release_fade: f64,
    /// Extra margin added on top of `release_fade`.
    pub release_guard: f64,
    /// Whether the master stage starts audible.
    pub start_enabled: bool,
    /// Default level of the gain stage placed behind each sound node.
    pub sound_level: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fade_time_constant: 0.02,
            release_fade: 0.1,
            release_guard: 0.05,
            start_enabled: true,
            sound_level: 0.5,
        }
    }
}

impl AudioConfig {
    /// Minimum time between a release request and the bus disconnect.
    pub fn release_window(&self) -> f64 {
        self.release_fade + self.release_guard
    }
}

/// Frame driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub fps: u32,
    /// Upper bound applied to a single frame delta, in seconds.
    pub max_delta: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            max_delta: 0.25,
        }
    }
}

impl FrameConfig {
    pub fn frame_time(&self) -> f32 {
        1.0 / self.fps.max(1) as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub visible: bool,
    pub toggle_key: char,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            visible: false,
            toggle_key: '\'',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(r#"{ "audio": { "sample_rate": 8000 } }"#).unwrap();
        assert_eq!(config.audio.sample_rate, 8000);
        assert_eq!(config.audio.fade_time_constant, 0.02);
        assert_eq!(config.frame.fps, 60);
        assert_eq!(config.debug.toggle_key, '\'');
    }

    #[test]
    fn release_window_adds_guard() {
        let audio = AudioConfig::default();
        assert!((audio.release_window() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(AppConfig::from_json("{ audio: }").is_err());
    }
}
