// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture session supervisor
//!
//! `sh` scripts stand in for ffmpeg and ffplay so the real process and
//! signal plumbing is exercised.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use vhs_capture::backends::accel::AccelerationProfile;
use vhs_capture::backends::video::{DetectedFormat, DetectedStandard, Framerate, VideoStandard};
use vhs_capture::pipelines::capture::{Invocation, Session, SessionPlan, SessionState, run_session};
use vhs_capture::process::is_alive;
use vhs_capture::storage::Artifacts;
use vhs_capture::{CaptureError, ScriptedPrompter, StopSignal};

/// Scripts are written and executed here; running tests one at a time keeps
/// a concurrent fork from holding a script open for writing (ETXTBSY)
static SERIAL: Mutex<()> = Mutex::new(());

const STREAMING_ENCODER: &str = "while :; do echo frame; sleep 0.05; done";

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

fn plan(dir: &Path, encoder_script: &str, preview_program: &str) -> SessionPlan {
    SessionPlan {
        encoder: Invocation::new("sh", vec!["-c".to_string(), encoder_script.to_string()]),
        preview_program: preview_program.to_string(),
        standard: pal(),
        profile: AccelerationProfile::Software,
        artifacts: Artifacts::new(dir, "Test.mkv"),
    }
}

/// Preview stand-in: reads its last argument like ffplay reads the channel
fn fake_preview(dir: &Path) -> PathBuf {
    let path = dir.join("fake-ffplay");
    std::fs::write(
        &path,
        "#!/bin/sh\nfor last; do :; done\nexec cat \"$last\" > /dev/null\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Deliver a stop request once the session is listening
fn interrupt_after(stop: &StopSignal, delay: Duration) -> JoinHandle<()> {
    let stop = stop.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        for _ in 0..400 {
            if stop.raise() {
                return;
            }
            thread::sleep(Duration::from_millis(25));
        }
    })
}

/// Deliver a stop request the moment the session starts listening
fn interrupt_on_route(stop: &StopSignal) -> JoinHandle<()> {
    let stop = stop.clone();
    thread::spawn(move || {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while std::time::Instant::now() < deadline {
            if stop.raise() {
                return;
            }
            thread::yield_now();
        }
    })
}

fn assert_reaped(session: &Session) {
    assert_eq!(session.state(), SessionState::Reaped);
    for pid in [session.encoder_pid(), session.preview_pid()]
        .into_iter()
        .flatten()
    {
        assert!(!is_alive(pid), "process {} still running", pid);
    }
    let channel = session.channel_path().expect("channel was created");
    assert!(!channel.exists());
}

#[test]
fn test_user_stop_keeps_capture() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let preview = fake_preview(dir.path());
    let plan = plan(dir.path(), STREAMING_ENCODER, preview.to_str().unwrap());

    let stop = StopSignal::new();
    let raiser = interrupt_after(&stop, Duration::from_millis(400));
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new(), [true]);
    let mut session = Session::new();

    let summary = run_session(&plan, &mut session, &mut prompter, &stop).unwrap();
    raiser.join().unwrap();

    assert_eq!(session.outcome(), Some(SessionState::UserStopped));
    assert!(session.preview_pid().is_some());
    assert_reaped(&session);

    assert!(summary.bytes_written > 0);
    let written = std::fs::read(&plan.artifacts.intermediate).unwrap();
    assert_eq!(written.len() as u64, summary.bytes_written);
    assert!(written.starts_with(b"frame\n"));

    let log = std::fs::read_to_string(&plan.artifacts.log).unwrap();
    assert!(log.contains("===== Capture ====="));
    assert!(log.contains("Encoder command: sh -c"));
    assert!(log.contains("Capture stopped by user"));
}

#[test]
fn test_encoder_exit_is_failure() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let preview = fake_preview(dir.path());
    let plan = plan(dir.path(), "echo partial; exit 3", preview.to_str().unwrap());

    let stop = StopSignal::new();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new(), [true]);
    let mut session = Session::new();

    let result = run_session(&plan, &mut session, &mut prompter, &stop);
    match result {
        Err(CaptureError::CaptureProcessFailed { reason, log }) => {
            assert!(reason.contains("exit code 3"), "reason: {}", reason);
            assert_eq!(log.as_deref(), Some(plan.artifacts.log.as_path()));
        }
        other => panic!("expected CaptureProcessFailed, got {:?}", other),
    }

    assert_eq!(session.outcome(), Some(SessionState::Failed));
    assert_reaped(&session);
    // Whatever was captured is kept for inspection
    assert_eq!(
        std::fs::read(&plan.artifacts.intermediate).unwrap(),
        b"partial\n"
    );
    let log = std::fs::read_to_string(&plan.artifacts.log).unwrap();
    assert!(log.contains("Capture failed"));
}

#[test]
fn test_declined_start_runs_nothing() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let plan = plan(dir.path(), STREAMING_ENCODER, "ffplay");

    let stop = StopSignal::new();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new(), [false]);
    let mut session = Session::new();

    let result = run_session(&plan, &mut session, &mut prompter, &stop);
    assert_eq!(result, Err(CaptureError::CancelledByUser));
    assert_eq!(session.encoder_pid(), None);
    assert_eq!(session.channel_path(), None);
    assert!(!plan.artifacts.log.exists());
    assert!(!plan.artifacts.intermediate.exists());
}

#[test]
fn test_missing_preview_is_not_fatal() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let plan = plan(
        dir.path(),
        STREAMING_ENCODER,
        "/nonexistent/vhs-capture-preview",
    );

    let stop = StopSignal::new();
    let raiser = interrupt_after(&stop, Duration::from_millis(300));
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new(), [true]);
    let mut session = Session::new();

    let summary = run_session(&plan, &mut session, &mut prompter, &stop).unwrap();
    raiser.join().unwrap();

    assert_eq!(session.preview_pid(), None);
    assert_reaped(&session);
    assert!(summary.bytes_written > 0);
    let log = std::fs::read_to_string(&plan.artifacts.log).unwrap();
    assert!(log.contains("Failed to start preview"));
}

#[test]
fn test_preview_closing_early_is_not_fatal() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    // `false` ignores its arguments and exits at once
    let plan = plan(dir.path(), STREAMING_ENCODER, "false");

    let stop = StopSignal::new();
    let raiser = interrupt_after(&stop, Duration::from_millis(500));
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new(), [true]);
    let mut session = Session::new();

    let summary = run_session(&plan, &mut session, &mut prompter, &stop).unwrap();
    raiser.join().unwrap();

    assert_eq!(session.outcome(), Some(SessionState::UserStopped));
    assert_reaped(&session);
    assert!(summary.bytes_written > 0);
    let log = std::fs::read_to_string(&plan.artifacts.log).unwrap();
    assert!(log.contains("Preview exited: exit code 1"));
}

#[test]
fn test_stop_during_startup_still_cleans_up() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let preview = fake_preview(dir.path());
    let plan = plan(dir.path(), STREAMING_ENCODER, preview.to_str().unwrap());

    let stop = StopSignal::new();
    let raiser = interrupt_on_route(&stop);
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new(), [true]);
    let mut session = Session::new();

    // The stop lands while the session is still setting up and is handled
    // once the encoder runs
    let summary = run_session(&plan, &mut session, &mut prompter, &stop).unwrap();
    raiser.join().unwrap();

    assert_eq!(session.outcome(), Some(SessionState::UserStopped));
    assert_reaped(&session);
    assert_eq!(summary.intermediate, plan.artifacts.intermediate);
    assert!(plan.artifacts.intermediate.exists());
}
