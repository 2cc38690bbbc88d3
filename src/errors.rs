// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture tool
//!
//! Every failure is terminal for the run. Each variant maps to one stable
//! process exit code so that wrapper scripts can react to specific causes.

use std::fmt;
use std::path::PathBuf;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Exit code used when the run is stopped by SIGINT/SIGTERM outside a capture
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Main error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// A required external program is not on PATH
    MissingDependency(String),
    /// Video device path does not name a device node
    NonexistentVideoDevice(String),
    /// Audio device is not listed by the audio subsystem
    NonexistentAudioDevice(String),
    /// Audio bitrate is not an integer in range
    InvalidAudioBitrate(String),
    /// Quality factor is not an integer in range
    InvalidQualityFactor(String),
    /// Preset is not one of the known encoder presets
    InvalidPreset(String),
    /// Output directory contains an illegal character
    IllegalDirectoryName(String),
    /// `~user` names a user without a home directory
    NoSuchHomeDirectory(String),
    /// Output directory could not be created
    DirectoryCreateFailed { path: PathBuf, reason: String },
    /// Output directory exists but is not writable
    DirectoryNotWritable(PathBuf),
    /// Output filename has characters outside `[A-Za-z0-9._-]`
    InvalidFilename(String),
    /// User declined a confirmation prompt
    CancelledByUser,
    /// Capability query on the video device failed
    DeviceProbeFailed { device: String, reason: String },
    /// Device reports a format that is not a known analog standard
    UnsupportedStandard(String),
    /// Encoder exited on its own (or could not be started)
    CaptureProcessFailed { reason: String, log: Option<PathBuf> },
    /// Remux did not produce the final artifact
    FinaliseFailed { reason: String, log: PathBuf },
    /// Trim did not produce the trimmed artifact
    TrimFailed { reason: String, log: PathBuf },
    /// Stopped by an external signal outside the capture itself
    Interrupted,
}

impl CaptureError {
    /// Process exit code for this failure kind
    pub fn exit_code(&self) -> i32 {
        match self {
            CaptureError::MissingDependency(_) => 1,
            CaptureError::NonexistentVideoDevice(_) => 2,
            CaptureError::NonexistentAudioDevice(_) => 3,
            CaptureError::InvalidAudioBitrate(_) => 4,
            CaptureError::InvalidQualityFactor(_) => 5,
            CaptureError::InvalidPreset(_) => 6,
            CaptureError::IllegalDirectoryName(_) => 7,
            CaptureError::NoSuchHomeDirectory(_) => 8,
            CaptureError::DirectoryCreateFailed { .. } => 9,
            CaptureError::DirectoryNotWritable(_) => 10,
            CaptureError::InvalidFilename(_) => 11,
            CaptureError::CancelledByUser => 12,
            CaptureError::DeviceProbeFailed { .. } => 13,
            CaptureError::UnsupportedStandard(_) => 14,
            CaptureError::CaptureProcessFailed { .. } => 15,
            CaptureError::FinaliseFailed { .. } => 16,
            CaptureError::TrimFailed { .. } => 17,
            CaptureError::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }

    /// Log file the user should look at, if the failure has one
    pub fn log_path(&self) -> Option<&PathBuf> {
        match self {
            CaptureError::CaptureProcessFailed { log, .. } => log.as_ref(),
            CaptureError::FinaliseFailed { log, .. } | CaptureError::TrimFailed { log, .. } => {
                Some(log)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::MissingDependency(tool) => {
                write!(f, "Required program '{}' was not found on PATH", tool)
            }
            CaptureError::NonexistentVideoDevice(dev) => {
                write!(f, "Video device '{}' does not exist", dev)
            }
            CaptureError::NonexistentAudioDevice(dev) => {
                write!(f, "Audio device '{}' does not exist", dev)
            }
            CaptureError::InvalidAudioBitrate(value) => write!(
                f,
                "Invalid audio bitrate '{}': expected an integer between {} and {} kbps",
                value,
                crate::constants::defaults::AUDIO_BITRATE_MIN,
                crate::constants::defaults::AUDIO_BITRATE_MAX
            ),
            CaptureError::InvalidQualityFactor(value) => write!(
                f,
                "Invalid quality factor '{}': expected an integer between {} and {}",
                value,
                crate::constants::defaults::QUALITY_MIN,
                crate::constants::defaults::QUALITY_MAX
            ),
            CaptureError::InvalidPreset(value) => write!(
                f,
                "Invalid preset '{}'. Valid presets: {}",
                value,
                crate::constants::Preset::valid_names()
            ),
            CaptureError::IllegalDirectoryName(dir) => {
                write!(f, "Output directory '{}' contains illegal characters", dir)
            }
            CaptureError::NoSuchHomeDirectory(user) => {
                write!(f, "No home directory for user '{}'", user)
            }
            CaptureError::DirectoryCreateFailed { path, reason } => write!(
                f,
                "Failed to create output directory {}: {}",
                path.display(),
                reason
            ),
            CaptureError::DirectoryNotWritable(path) => {
                write!(f, "Output directory {} is not writable", path.display())
            }
            CaptureError::InvalidFilename(name) => write!(
                f,
                "Invalid filename '{}': only letters, digits, '.', '_' and '-' are allowed",
                name
            ),
            CaptureError::CancelledByUser => write!(f, "Cancelled by user"),
            CaptureError::DeviceProbeFailed { device, reason } => {
                write!(f, "Failed to query video device {}: {}", device, reason)
            }
            CaptureError::UnsupportedStandard(detected) => {
                write!(f, "Unsupported video standard: {}", detected)
            }
            CaptureError::CaptureProcessFailed { reason, .. } => {
                write!(f, "Capture failed: {}", reason)
            }
            CaptureError::FinaliseFailed { reason, .. } => {
                write!(f, "Failed to finalise recording: {}", reason)
            }
            CaptureError::TrimFailed { reason, .. } => write!(f, "Trim failed: {}", reason),
            CaptureError::Interrupted => write!(f, "Interrupted"),
        }
    }
}

impl std::error::Error for CaptureError {}
