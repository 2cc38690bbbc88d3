// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for validation, command construction and
//! post-processing

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use vhs_capture::backends::accel::AccelerationProfile;
use vhs_capture::backends::video::{DetectedFormat, DetectedStandard, Framerate, VideoStandard};
use vhs_capture::config::AudioDeviceId;
use vhs_capture::pipelines::capture::build_capture_args;
use vhs_capture::pipelines::post::trim::{TrimBounds, trim};
use vhs_capture::pipelines::post::{Offset, finalise};
use vhs_capture::storage::{Artifacts, SessionLog};
use vhs_capture::validation::{FieldDefaults, RawInputs, validate};
use vhs_capture::{CaptureError, Preset, ScriptedPrompter, StopSignal};

/// See session_tests.rs: serialise tests that write and run scripts
static SERIAL: Mutex<()> = Mutex::new(());

/// ffmpeg stand-in that writes `body` to its last argument, then exits
/// with `code`
fn fake_ffmpeg(dir: &Path, body: &str, code: i32) -> PathBuf {
    let path = dir.join("fake-ffmpeg");
    std::fs::write(
        &path,
        format!(
            "#!/bin/sh\nfor last; do :; done\nprintf '{}' > \"$last\"\nexit {}\n",
            body, code
        ),
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn captured(dir: &Path) -> (Artifacts, SessionLog) {
    let artifacts = Artifacts::new(dir, "Test.mkv");
    std::fs::write(&artifacts.intermediate, b"transport stream").unwrap();
    let log = SessionLog::open(&artifacts.log).unwrap();
    (artifacts, log)
}

fn pal() -> DetectedStandard {
    DetectedStandard {
        format: DetectedFormat {
            width: 720,
            height: 576,
            framerate: Framerate::new(25, 1),
        },
        standard: VideoStandard::Pal,
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[test]
fn test_validated_fields_reach_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let raw = RawInputs {
        // Any character device passes the device-node check
        video_device: "/dev/null".to_string(),
        audio_device: "1:0".to_string(),
        audio_bitrate: "192".to_string(),
        quality: "21".to_string(),
        preset: "fast".to_string(),
        output_dir: dir.path().display().to_string(),
        filename: "Test".to_string(),
    };
    let available = [AudioDeviceId { card: 1, device: 0 }];
    let mut prompter = ScriptedPrompter::default();

    let config = validate(&raw, &FieldDefaults::default(), &available, &mut prompter).unwrap();
    assert_eq!(config.filename, "Test.mkv");
    assert_eq!(config.preset, Preset::Fast);

    let args = build_capture_args(&config, &pal(), &AccelerationProfile::Software);
    assert_eq!(value_after(&args, "-video_size"), Some("720x576"));
    assert_eq!(value_after(&args, "-framerate"), Some("25"));
    assert_eq!(value_after(&args, "-crf"), Some("21"));
    assert_eq!(value_after(&args, "-preset"), Some("fast"));
    assert_eq!(value_after(&args, "-b:a"), Some("192k"));
    assert!(args.iter().any(|a| a == "hw:1,0"));
    assert!(args.iter().any(|a| a == "/dev/null"));
}

#[test]
fn test_validation_stops_at_first_bad_field() {
    let raw = RawInputs {
        audio_bitrate: "500".to_string(),
        quality: "99".to_string(),
        ..RawInputs::default()
    };
    let mut prompter = ScriptedPrompter::default();
    let result = validate(&raw, &FieldDefaults::default(), &[], &mut prompter);
    assert!(matches!(result, Err(CaptureError::InvalidAudioBitrate(_))));
    assert_eq!(result.unwrap_err().exit_code(), 4);
}

#[test]
fn test_remux_success_removes_intermediate() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "matroska", 0);
    let (artifacts, mut log) = captured(dir.path());

    finalise(&artifacts, ffmpeg.to_str().unwrap(), &mut log, &StopSignal::new()).unwrap();

    assert_eq!(std::fs::read(&artifacts.final_path).unwrap(), b"matroska");
    assert!(!artifacts.intermediate.exists());
    let log = std::fs::read_to_string(&artifacts.log).unwrap();
    assert!(log.contains("===== Remux ====="));
    assert!(log.contains("Remux finished: exit code 0"));
}

#[test]
fn test_remux_judged_by_output_not_exit_code() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "matroska", 1);
    let (artifacts, mut log) = captured(dir.path());

    finalise(&artifacts, ffmpeg.to_str().unwrap(), &mut log, &StopSignal::new()).unwrap();
    assert!(artifacts.final_path.exists());
    assert!(!artifacts.intermediate.exists());
}

#[test]
fn test_remux_without_output_keeps_intermediate() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let (artifacts, mut log) = captured(dir.path());

    // Exits 0 but writes nothing
    let result = finalise(&artifacts, "true", &mut log, &StopSignal::new());

    match result {
        Err(CaptureError::FinaliseFailed { log, .. }) => assert_eq!(log, artifacts.log),
        other => panic!("expected FinaliseFailed, got {:?}", other),
    }
    assert!(!artifacts.final_path.exists());
    assert_eq!(
        std::fs::read(&artifacts.intermediate).unwrap(),
        b"transport stream"
    );
}

#[test]
fn test_trim_replaces_final() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "trimmed", 0);
    let (artifacts, mut log) = captured(dir.path());
    std::fs::write(&artifacts.final_path, b"full recording").unwrap();

    let bounds = TrimBounds::new(
        Offset::parse("00:00:05").unwrap(),
        Offset::parse("1:00").unwrap(),
    )
    .unwrap();
    trim(
        &artifacts,
        &bounds,
        ffmpeg.to_str().unwrap(),
        &mut log,
        &StopSignal::new(),
    )
    .unwrap();

    assert_eq!(std::fs::read(&artifacts.final_path).unwrap(), b"trimmed");
    assert!(!artifacts.trimmed.exists());
    let log = std::fs::read_to_string(&artifacts.log).unwrap();
    assert!(log.contains("Keeping 00:00:05 to 1:00"));
}

#[test]
fn test_failed_trim_keeps_final() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let (artifacts, mut log) = captured(dir.path());
    std::fs::write(&artifacts.final_path, b"full recording").unwrap();

    let bounds =
        TrimBounds::new(Offset::parse("5").unwrap(), Offset::parse("60s").unwrap()).unwrap();
    let result = trim(&artifacts, &bounds, "true", &mut log, &StopSignal::new());

    assert!(matches!(result, Err(CaptureError::TrimFailed { .. })));
    assert_eq!(result.unwrap_err().exit_code(), 17);
    assert_eq!(
        std::fs::read(&artifacts.final_path).unwrap(),
        b"full recording"
    );
    assert!(!artifacts.trimmed.exists());
}
