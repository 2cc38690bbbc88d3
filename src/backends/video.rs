// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture device queries and analog standard detection

use crate::errors::{CaptureError, CaptureResult};
use crate::prompt::Prompter;
use std::fmt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use v4l::video::Capture;

/// Frame rate as a rational number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Build from a V4L2 frame interval (seconds per frame)
    pub fn from_interval(numerator: u32, denominator: u32) -> Option<Self> {
        if numerator == 0 || denominator == 0 {
            return None;
        }
        Some(Self::new(denominator, numerator))
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Value for ffmpeg's `-framerate`/`-r` options
    ///
    /// Whole rates are written as integers ("25"), others as a fraction
    /// ("30000/1001") so that no precision is lost.
    pub fn ffmpeg_arg(&self) -> String {
        if self.num % self.denom == 0 {
            (self.num / self.denom).to_string()
        } else {
            format!("{}/{}", self.num, self.denom)
        }
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.num % self.denom == 0 {
            write!(f, "{}", self.num / self.denom)
        } else {
            write!(f, "{:.2}", self.as_f64())
        }
    }
}

/// Resolution and rate reported by the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
}

impl DetectedFormat {
    /// Size in ffmpeg's `WxH` notation
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {} fps", self.width, self.height, self.framerate)
    }
}

/// Analog video standards the capture settings are tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStandard {
    /// 720x576 @ 25 fps
    Pal,
    /// 720x480 @ 29.97 fps
    Ntsc,
    /// Anything else
    Unclassified,
}

impl VideoStandard {
    pub fn display_name(&self) -> &'static str {
        match self {
            VideoStandard::Pal => "PAL",
            VideoStandard::Ntsc => "NTSC",
            VideoStandard::Unclassified => "unclassified",
        }
    }
}

/// Tolerance when matching a reported rate against a standard's rate
const FRAMERATE_TOLERANCE: f64 = 0.01;

/// Classify a device format against the known standards
pub fn classify(format: &DetectedFormat) -> VideoStandard {
    let fps = format.framerate.as_f64();
    match (format.width, format.height) {
        (720, 576) if (fps - 25.0).abs() < FRAMERATE_TOLERANCE => VideoStandard::Pal,
        (720, 480) if (fps - 30_000.0 / 1001.0).abs() < FRAMERATE_TOLERANCE => {
            VideoStandard::Ntsc
        }
        _ => VideoStandard::Unclassified,
    }
}

/// Format and classification, computed once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedStandard {
    pub format: DetectedFormat,
    pub standard: VideoStandard,
}

impl DetectedStandard {
    /// Rate for ffmpeg's `-framerate`/`-r`
    ///
    /// A classified standard gets its nominal rate, whatever fraction the
    /// device used to report it; anything else keeps the device's rate.
    pub fn framerate_arg(&self) -> String {
        match self.standard {
            VideoStandard::Pal => "25".to_string(),
            VideoStandard::Ntsc => "30000/1001".to_string(),
            VideoStandard::Unclassified => self.format.framerate.ffmpeg_arg(),
        }
    }
}

impl fmt::Display for DetectedStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.standard.display_name(), self.format)
    }
}

/// List V4L2 device nodes, lowest index first
pub fn enumerate_video_devices() -> Vec<PathBuf> {
    let mut nodes = v4l::context::enum_devices();
    nodes.sort_by_key(|node| node.index());

    let devices: Vec<PathBuf> = nodes.iter().map(|node| node.path().to_path_buf()).collect();
    debug!(count = devices.len(), "Enumerated V4L2 devices");
    devices
}

/// Check that a path names a character device
pub fn is_device_node(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.file_type().is_char_device())
        .unwrap_or(false)
}

/// Read the current capture format and frame interval from the device
pub fn query_format(device: &Path) -> std::io::Result<DetectedFormat> {
    let dev = v4l::Device::with_path(device)?;
    let format = dev.format()?;
    let params = dev.params()?;

    let framerate = Framerate::from_interval(params.interval.numerator, params.interval.denominator)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "device reported a zero frame interval",
            )
        })?;

    let detected = DetectedFormat {
        width: format.width,
        height: format.height,
        framerate,
    };
    debug!(device = %device.display(), format = %detected, "Queried capture format");
    Ok(detected)
}

/// Probe the device and classify it, asking before continuing with an
/// unknown format
pub fn detect_standard(
    device: &Path,
    prompter: &mut dyn Prompter,
) -> CaptureResult<DetectedStandard> {
    let format = query_format(device).map_err(|e| CaptureError::DeviceProbeFailed {
        device: device.display().to_string(),
        reason: e.to_string(),
    })?;

    resolve_standard(format, prompter)
}

/// Classification step of [`detect_standard`], separated from the ioctl
pub fn resolve_standard(
    format: DetectedFormat,
    prompter: &mut dyn Prompter,
) -> CaptureResult<DetectedStandard> {
    let standard = classify(&format);
    let detected = DetectedStandard { format, standard };

    if standard == VideoStandard::Unclassified {
        warn!(format = %format, "Device format is neither PAL nor NTSC");
        println!("Detected format {} is not a known VHS standard.", format);
        let proceed = prompter
            .confirm("Continue anyway?", false)
            .map_err(|_| CaptureError::CancelledByUser)?;
        if !proceed {
            return Err(CaptureError::UnsupportedStandard(format.to_string()));
        }
    } else {
        info!(standard = %detected, "Detected video standard");
    }

    Ok(detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;

    fn format(width: u32, height: u32, num: u32, denom: u32) -> DetectedFormat {
        DetectedFormat {
            width,
            height,
            framerate: Framerate::new(num, denom),
        }
    }

    #[test]
    fn test_classify_known_standards() {
        assert_eq!(classify(&format(720, 576, 25, 1)), VideoStandard::Pal);
        assert_eq!(classify(&format(720, 480, 30000, 1001)), VideoStandard::Ntsc);
        assert_eq!(classify(&format(720, 480, 2997, 100)), VideoStandard::Ntsc);
    }

    #[test]
    fn test_classify_mismatched_pairs() {
        assert_eq!(classify(&format(720, 576, 30000, 1001)), VideoStandard::Unclassified);
        assert_eq!(classify(&format(720, 480, 25, 1)), VideoStandard::Unclassified);
        assert_eq!(classify(&format(640, 480, 30, 1)), VideoStandard::Unclassified);
    }

    #[test]
    fn test_framerate_from_interval() {
        let ntsc = Framerate::from_interval(1001, 30000).unwrap();
        assert_eq!(ntsc.ffmpeg_arg(), "30000/1001");
        assert_eq!(ntsc.to_string(), "29.97");

        let pal = Framerate::from_interval(1, 25).unwrap();
        assert_eq!(pal.ffmpeg_arg(), "25");
        assert!(Framerate::from_interval(0, 25).is_none());
    }

    #[test]
    fn test_unclassified_requires_confirmation() {
        let mut decline = ScriptedPrompter::new(Vec::<String>::new(), [false]);
        let result = resolve_standard(format(640, 480, 30, 1), &mut decline);
        assert!(matches!(result, Err(CaptureError::UnsupportedStandard(_))));

        let mut accept = ScriptedPrompter::new(Vec::<String>::new(), [true]);
        let detected = resolve_standard(format(640, 480, 30, 1), &mut accept).unwrap();
        assert_eq!(detected.standard, VideoStandard::Unclassified);
    }

    #[test]
    fn test_known_standard_asks_nothing() {
        let mut prompter = ScriptedPrompter::default();
        let detected = resolve_standard(format(720, 576, 25, 1), &mut prompter).unwrap();
        assert_eq!(detected.standard, VideoStandard::Pal);
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_regular_file_is_not_a_device_node() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(!is_device_node(file.path()));
        assert!(!is_device_node(Path::new("/nonexistent/video0")));
    }
}
