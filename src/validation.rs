// SPDX-License-Identifier: GPL-3.0-only

//! Input validation
//!
//! Turns the raw text of each field into a [`CaptureConfig`]. Empty fields take
//! their default, everything else must pass its check or the run ends with the
//! matching [`CaptureError`]. Fields without side effects are checked first so
//! that a bad number never creates a directory.

use crate::config::{AudioDeviceId, CaptureConfig};
use crate::constants::{ILLEGAL_DIRECTORY_CHARS, Preset, artifacts::FINAL_EXTENSION, defaults};
use crate::errors::{CaptureError, CaptureResult};
use crate::prompt::Prompter;
use crate::storage::Artifacts;
use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Raw field values as typed by the user; empty means "use the default"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInputs {
    pub video_device: String,
    pub audio_device: String,
    pub audio_bitrate: String,
    pub quality: String,
    pub preset: String,
    pub output_dir: String,
    pub filename: String,
}

/// Default for each field, shown at the prompt and used for empty answers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDefaults {
    pub video_device: String,
    pub audio_device: String,
    pub audio_bitrate: String,
    pub quality: String,
    pub preset: String,
    pub output_dir: String,
    pub filename: String,
}

impl RawInputs {
    /// Fill fields not given on the command line by asking the user
    ///
    /// With `ask` false, missing fields stay empty and take their default.
    pub fn collect(
        given: RawInputs,
        defaults: &FieldDefaults,
        prompter: &mut dyn Prompter,
        ask: bool,
    ) -> CaptureResult<Self> {
        let mut fill = |value: String, question: &str, default: &str| -> CaptureResult<String> {
            if !value.is_empty() || !ask {
                return Ok(value);
            }
            prompter
                .ask(question, default)
                .map_err(|_| CaptureError::CancelledByUser)
        };

        Ok(Self {
            video_device: fill(given.video_device, "Video device", &defaults.video_device)?,
            audio_device: fill(
                given.audio_device,
                "Audio device (card:device)",
                &defaults.audio_device,
            )?,
            audio_bitrate: fill(
                given.audio_bitrate,
                "Audio bitrate in kbps",
                &defaults.audio_bitrate,
            )?,
            quality: fill(given.quality, "Quality factor (0-51)", &defaults.quality)?,
            preset: fill(given.preset, "Encoder preset", &defaults.preset)?,
            output_dir: fill(given.output_dir, "Output directory", &defaults.output_dir)?,
            filename: fill(given.filename, "Output filename", &defaults.filename)?,
        })
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { default } else { value }
}

/// Audio bitrate in kbps, within the supported range
pub fn validate_bitrate(value: &str) -> CaptureResult<u32> {
    parse_in_range(
        value,
        defaults::AUDIO_BITRATE_MIN,
        defaults::AUDIO_BITRATE_MAX,
    )
    .ok_or_else(|| CaptureError::InvalidAudioBitrate(value.to_string()))
}

/// Quality factor (CRF for libx264, QP for VAAPI)
pub fn validate_quality(value: &str) -> CaptureResult<u32> {
    parse_in_range(value, defaults::QUALITY_MIN, defaults::QUALITY_MAX)
        .ok_or_else(|| CaptureError::InvalidQualityFactor(value.to_string()))
}

/// Digits only; signs, decimals and whitespace are rejected
fn parse_in_range(value: &str, min: u32, max: u32) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let parsed: u32 = value.parse().ok()?;
    (min..=max).contains(&parsed).then_some(parsed)
}

pub fn validate_preset(value: &str) -> CaptureResult<Preset> {
    value
        .parse()
        .map_err(|_| CaptureError::InvalidPreset(value.to_string()))
}

/// The video device must be an existing character device node
pub fn validate_video_device(value: &str) -> CaptureResult<PathBuf> {
    let path = PathBuf::from(value);
    if value.is_empty() || !crate::backends::video::is_device_node(&path) {
        return Err(CaptureError::NonexistentVideoDevice(value.to_string()));
    }
    Ok(path)
}

/// The audio device must be one the audio subsystem listed
pub fn validate_audio_device(
    value: &str,
    available: &[AudioDeviceId],
) -> CaptureResult<AudioDeviceId> {
    AudioDeviceId::parse(value)
        .filter(|id| available.contains(id))
        .ok_or_else(|| CaptureError::NonexistentAudioDevice(value.to_string()))
}

/// Reject paths containing illegal or control characters
pub fn check_directory_chars(value: &str) -> CaptureResult<()> {
    if value
        .chars()
        .any(|c| ILLEGAL_DIRECTORY_CHARS.contains(&c) || c.is_control())
    {
        return Err(CaptureError::IllegalDirectoryName(value.to_string()));
    }
    Ok(())
}

/// Expand a leading `~` or `~user`
pub fn expand_home(value: &str) -> CaptureResult<PathBuf> {
    let Some(rest) = value.strip_prefix('~') else {
        return Ok(PathBuf::from(value));
    };

    let (user, tail) = match rest.find('/') {
        Some(idx) => (&rest[..idx], rest[idx + 1..].trim_start_matches('/')),
        None => (rest, ""),
    };

    let home = if user.is_empty() {
        dirs::home_dir().ok_or_else(|| {
            CaptureError::NoSuchHomeDirectory(std::env::var("USER").unwrap_or_default())
        })?
    } else {
        home_of(user).ok_or_else(|| CaptureError::NoSuchHomeDirectory(user.to_string()))?
    };

    Ok(if tail.is_empty() { home } else { home.join(tail) })
}

/// Home directory of a named user from the password database
fn home_of(user: &str) -> Option<PathBuf> {
    let name = CString::new(user).ok()?;
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0 as libc::c_char; 16 * 1024];
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let rc = unsafe {
        libc::getpwnam_r(
            name.as_ptr(),
            &mut pwd,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() || pwd.pw_dir.is_null() {
        return None;
    }

    let dir = unsafe { CStr::from_ptr(pwd.pw_dir) };
    let dir = PathBuf::from(OsStr::from_bytes(dir.to_bytes()));
    if dir.as_os_str().is_empty() {
        None
    } else {
        Some(dir)
    }
}

fn is_writable(path: &Path) -> bool {
    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(cpath.as_ptr(), libc::W_OK | libc::X_OK) == 0 }
}

/// Create the output directory, or check that an existing one is writable
pub fn prepare_output_dir(path: &Path) -> CaptureResult<PathBuf> {
    if path.is_dir() {
        if !is_writable(path) {
            return Err(CaptureError::DirectoryNotWritable(path.to_path_buf()));
        }
    } else {
        std::fs::create_dir_all(path).map_err(|e| CaptureError::DirectoryCreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "Created output directory");
    }

    Ok(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
}

/// Check the filename and make sure it carries the final extension
pub fn normalize_filename(value: &str) -> CaptureResult<String> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid || value.chars().all(|c| c == '.') {
        return Err(CaptureError::InvalidFilename(value.to_string()));
    }

    let suffix = format!(".{}", FINAL_EXTENSION);
    if value.ends_with(&suffix) && value.len() > suffix.len() {
        Ok(value.to_string())
    } else {
        let name = format!("{}{}", value, suffix);
        warn!(filename = %name, "Appended container extension to filename");
        println!("Note: saving as {}", name);
        Ok(name)
    }
}

/// Ask before overwriting anything left by an earlier session
///
/// Accepting removes the old files so the new log starts empty.
pub fn check_collisions(artifacts: &Artifacts, prompter: &mut dyn Prompter) -> CaptureResult<()> {
    let existing = artifacts.existing();
    if existing.is_empty() {
        return Ok(());
    }

    for path in &existing {
        println!("Already exists: {}", path.display());
    }
    let overwrite = prompter
        .confirm("Overwrite existing files?", false)
        .map_err(|_| CaptureError::CancelledByUser)?;
    if !overwrite {
        return Err(CaptureError::CancelledByUser);
    }

    for path in existing {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove old artifact");
        }
    }
    Ok(())
}

/// Validate every field, in side-effect-free order first
pub fn validate(
    raw: &RawInputs,
    defaults: &FieldDefaults,
    available_audio: &[AudioDeviceId],
    prompter: &mut dyn Prompter,
) -> CaptureResult<CaptureConfig> {
    let audio_bitrate = validate_bitrate(or_default(&raw.audio_bitrate, &defaults.audio_bitrate))?;
    let quality = validate_quality(or_default(&raw.quality, &defaults.quality))?;
    let preset = validate_preset(or_default(&raw.preset, &defaults.preset))?;

    let video_device =
        validate_video_device(or_default(&raw.video_device, &defaults.video_device))?;
    let audio_device = validate_audio_device(
        or_default(&raw.audio_device, &defaults.audio_device),
        available_audio,
    )?;

    let filename = normalize_filename(or_default(&raw.filename, &defaults.filename))?;

    let dir = or_default(&raw.output_dir, &defaults.output_dir);
    check_directory_chars(dir)?;
    let output_dir = prepare_output_dir(&expand_home(dir)?)?;

    check_collisions(&Artifacts::new(&output_dir, &filename), prompter)?;

    let config = CaptureConfig {
        video_device,
        audio_device,
        audio_bitrate,
        quality,
        preset,
        output_dir,
        filename,
    };
    debug!(?config, "Validated capture configuration");
    Ok(config)
}
