// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// x264 speed/quality presets
///
/// Slower presets spend more CPU per frame for better compression at the same
/// quality factor. Only the software encoder honours them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    /// Keeps up with a live 576i source on most machines (default)
    #[default]
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
    Placebo,
}

impl Preset {
    /// All presets, fastest first
    pub const ALL: [Preset; 10] = [
        Preset::Ultrafast,
        Preset::Superfast,
        Preset::Veryfast,
        Preset::Faster,
        Preset::Fast,
        Preset::Medium,
        Preset::Slow,
        Preset::Slower,
        Preset::Veryslow,
        Preset::Placebo,
    ];

    /// Name as understood by libx264
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Ultrafast => "ultrafast",
            Preset::Superfast => "superfast",
            Preset::Veryfast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::Slower => "slower",
            Preset::Veryslow => "veryslow",
            Preset::Placebo => "placebo",
        }
    }

    /// Space separated list of every valid preset name
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or(())
    }
}

/// Built-in defaults for the capture configuration
pub mod defaults {
    /// Audio bitrate in kbps
    pub const AUDIO_BITRATE_KBPS: u32 = 192;
    pub const AUDIO_BITRATE_MIN: u32 = 32;
    pub const AUDIO_BITRATE_MAX: u32 = 320;

    /// x264 CRF / VAAPI QP
    pub const QUALITY: u32 = 21;
    pub const QUALITY_MIN: u32 = 0;
    pub const QUALITY_MAX: u32 = 51;

    /// Output directory, relative to the user's home
    pub const OUTPUT_DIR: &str = "~/Videos/vhs";

    /// Prefix of the generated filename (`vhs_YYYYmmdd_HHMMSS`)
    pub const FILENAME_PREFIX: &str = "vhs";
}

/// Encoder input/output parameters that do not depend on user input
pub mod encoding {
    /// Audio capture profile (stereo, 48 kHz)
    pub const AUDIO_CHANNELS: u32 = 2;
    pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

    /// Maximum samples the audio resampler may stretch/squeeze per second
    /// to follow drift between the video and audio clocks
    pub const AUDIO_ASYNC_SAMPLES: u32 = 1000;

    /// Packets buffered per input before the encoder
    pub const THREAD_QUEUE_SIZE: u32 = 1024;

    /// Raw pixel format requested from the capture card
    pub const CAPTURE_PIXEL_FORMAT: &str = "yuyv422";

    /// Streaming container for the live output
    pub const STREAM_FORMAT: &str = "mpegts";

    /// Audio codec for every template
    pub const AUDIO_CODEC: &str = "aac";
}

/// Artifact file extensions
pub mod artifacts {
    /// Final container, also required on the user's filename
    pub const FINAL_EXTENSION: &str = "mkv";

    /// Intermediate stream written during capture
    pub const INTERMEDIATE_EXTENSION: &str = "ts";

    /// Append-only session log
    pub const LOG_EXTENSION: &str = "log";

    /// Temporary output of the trim stage
    pub const TRIM_SUFFIX: &str = "trim";
}

/// Characters rejected in the output directory path
pub const ILLEGAL_DIRECTORY_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
