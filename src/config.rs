// SPDX-License-Identifier: GPL-3.0-only

//! Persisted settings and the validated capture configuration

use crate::constants::{Preset, defaults};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Names of the external programs the tool drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    /// Encoder, remuxer and trimmer
    pub ffmpeg: String,
    /// Live preview window
    pub ffplay: String,
    /// ALSA capture device listing
    pub arecord: String,
    /// Device manager query for render nodes
    pub udevadm: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffplay: "ffplay".to_string(),
            arecord: "arecord".to_string(),
            udevadm: "udevadm".to_string(),
        }
    }
}

/// User settings stored in `$XDG_CONFIG_HOME/vhs-capture/settings.json`
///
/// These only replace the built-in defaults offered at the prompts; every
/// value still goes through validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audio bitrate in kbps
    pub audio_bitrate: u32,
    /// x264 CRF / VAAPI QP
    pub quality: u32,
    /// x264 preset
    pub preset: Preset,
    /// Output directory (may start with `~`)
    pub output_dir: String,
    /// External program names
    pub tools: Tools,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_bitrate: defaults::AUDIO_BITRATE_KBPS,
            quality: defaults::QUALITY,
            preset: Preset::default(),
            output_dir: defaults::OUTPUT_DIR.to_string(),
            tools: Tools::default(),
        }
    }
}

impl Config {
    /// Default location of the settings file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vhs-capture").join("settings.json"))
    }

    /// Load settings, falling back to defaults when the file is missing or broken
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded settings");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed settings file");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read settings file");
                Self::default()
            }
        }
    }
}

/// Fully validated capture parameters
///
/// Only built by [`crate::validation`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Video device node (e.g. `/dev/video0`)
    pub video_device: PathBuf,
    /// ALSA device in `card:device` form
    pub audio_device: AudioDeviceId,
    /// Audio bitrate in kbps
    pub audio_bitrate: u32,
    /// x264 CRF / VAAPI QP
    pub quality: u32,
    /// x264 preset
    pub preset: Preset,
    /// Absolute, existing, writable output directory
    pub output_dir: PathBuf,
    /// Output filename including the final container extension
    pub filename: String,
}

/// ALSA capture device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioDeviceId {
    pub card: u32,
    pub device: u32,
}

impl AudioDeviceId {
    /// Parse the `card:device` form
    pub fn parse(s: &str) -> Option<Self> {
        let (card, device) = s.trim().split_once(':')?;
        Some(Self {
            card: card.parse().ok()?,
            device: device.parse().ok()?,
        })
    }

    /// Device name as ffmpeg's ALSA input expects it
    pub fn alsa_name(&self) -> String {
        format!("hw:{},{}", self.card, self.device)
    }
}

impl std::fmt::Display for AudioDeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.card, self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let config: Config = serde_json::from_str(r#"{"quality": 18}"#).unwrap();
        assert_eq!(config.quality, 18);
        assert_eq!(config.preset, Preset::Fast);
        assert_eq!(config.tools.ffmpeg, "ffmpeg");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json")));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load(Some(&path)), Config::default());
    }

    #[test]
    fn test_audio_device_id() {
        let id = AudioDeviceId::parse("1:0").unwrap();
        assert_eq!(id.alsa_name(), "hw:1,0");
        assert_eq!(id.to_string(), "1:0");
        assert!(AudioDeviceId::parse("hw:1,0").is_none());
        assert!(AudioDeviceId::parse("1").is_none());
    }
}
