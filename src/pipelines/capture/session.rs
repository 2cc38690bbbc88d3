// SPDX-License-Identifier: GPL-3.0-only

//! Capture session supervisor
//!
//! Runs the encoder and the preview side by side and waits until the user
//! stops the capture or the encoder dies. States move
//! `Idle → Confirming → Running → {UserStopped, Failed} → Reaped`; both
//! children are reaped and the preview channel removed before
//! [`run_session`] returns, whatever the outcome.

use super::channel::{FanOut, TransientChannel};
use super::command::{Invocation, preview_args};
use crate::backends::accel::AccelerationProfile;
use crate::backends::video::DetectedStandard;
use crate::constants::app_info;
use crate::errors::{CaptureError, CaptureResult};
use crate::process::{self, ChildEvent, Role, StopSignal, WatchedChild};
use crate::prompt::Prompter;
use crate::storage::{Artifacts, SessionLog};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use tracing::{debug, error, info, warn};

/// Everything needed to start a capture
#[derive(Debug, Clone)]
pub struct SessionPlan {
    /// Encoder writing the live stream to stdout
    pub encoder: Invocation,
    /// Preview program; the channel path is appended to its arguments
    pub preview_program: String,
    pub standard: DetectedStandard,
    pub profile: AccelerationProfile,
    pub artifacts: Artifacts,
}

impl SessionPlan {
    /// Full preview command for a given channel
    pub fn preview(&self, channel: &Path) -> Invocation {
        Invocation::new(self.preview_program.clone(), preview_args(channel))
    }
}

/// Supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Confirming,
    Running,
    UserStopped,
    Failed,
    Reaped,
}

/// Result of a capture that was stopped by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Bytes persisted to the intermediate artifact
    pub bytes_written: u64,
    pub intermediate: PathBuf,
    pub log: PathBuf,
}

/// Orchestration state of one capture, owned by the caller and only changed
/// by [`run_session`]
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    /// Outcome reached before reaping
    outcome: Option<SessionState>,
    encoder: Option<WatchedChild>,
    preview: Option<WatchedChild>,
    encoder_status: Option<String>,
    /// True until the encoder is seen to exit without being asked to
    expected_termination: bool,
    channel_path: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            outcome: None,
            encoder: None,
            preview: None,
            encoder_status: None,
            expected_termination: true,
            channel_path: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `UserStopped` or `Failed` once the session has run
    pub fn outcome(&self) -> Option<SessionState> {
        self.outcome
    }

    pub fn encoder_pid(&self) -> Option<u32> {
        self.encoder.as_ref().map(WatchedChild::pid)
    }

    pub fn preview_pid(&self) -> Option<u32> {
        self.preview.as_ref().map(WatchedChild::pid)
    }

    /// Path the preview channel had while running
    pub fn channel_path(&self) -> Option<&Path> {
        self.channel_path.as_deref()
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    fn children_running(&self) -> bool {
        [&self.encoder, &self.preview]
            .into_iter()
            .flatten()
            .any(|child| !child.has_exited())
    }

    fn terminate_all(&self) {
        for child in [&self.encoder, &self.preview].into_iter().flatten() {
            child.terminate();
        }
    }

    /// Block until every child has been reaped
    fn supervise(
        &mut self,
        events: &Receiver<ChildEvent>,
        stop: &StopSignal,
        log: &mut SessionLog,
    ) {
        while self.children_running() {
            let Ok(event) = events.recv() else {
                break;
            };

            match event {
                ChildEvent::Interrupted => {
                    if self.state == SessionState::Running {
                        println!();
                        println!("Stopping capture...");
                        log.note("Stop requested, terminating encoder and preview");
                        self.transition(SessionState::UserStopped);
                        self.terminate_all();
                    }
                }
                ChildEvent::Exited {
                    role: Role::Encoder,
                    status,
                } => {
                    let description = describe(&status);
                    if let Some(encoder) = self.encoder.as_mut() {
                        encoder.mark_exited();
                    }
                    log.note(&format!("Encoder exited: {}", description));
                    self.encoder_status = Some(description);

                    if self.state == SessionState::Running {
                        if stop.requested() {
                            // Signal raced with the exit
                            self.transition(SessionState::UserStopped);
                        } else {
                            self.expected_termination = false;
                            error!(
                                status = ?self.encoder_status,
                                "Encoder exited unexpectedly"
                            );
                            self.transition(SessionState::Failed);
                        }
                        self.terminate_all();
                    }
                }
                ChildEvent::Exited {
                    role: Role::Preview,
                    status,
                } => {
                    if let Some(preview) = self.preview.as_mut() {
                        preview.mark_exited();
                    }
                    let description = describe(&status);
                    log.note(&format!("Preview exited: {}", description));
                    if self.state == SessionState::Running {
                        warn!(status = %description, "Preview closed during capture");
                        println!("Preview closed; capture continues. Press Ctrl+C to stop.");
                    }
                }
                ChildEvent::Exited { role: Role::Tool, .. } => {}
            }
        }
    }
}

fn describe(status: &io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => process::describe_status(status),
        Err(e) => format!("wait failed: {}", e),
    }
}

fn start_failed(reason: String, log: Option<&Path>) -> CaptureError {
    CaptureError::CaptureProcessFailed {
        reason,
        log: log.map(Path::to_path_buf),
    }
}

/// Confirm, run and reap one capture session
pub fn run_session(
    plan: &SessionPlan,
    session: &mut Session,
    prompter: &mut dyn Prompter,
    stop: &StopSignal,
) -> CaptureResult<CaptureSummary> {
    session.transition(SessionState::Confirming);
    println!();
    println!("Capture command:");
    println!("  {}", plan.encoder);
    let approved = prompter
        .confirm("Start capture?", true)
        .map_err(|_| CaptureError::CancelledByUser)?;
    if !approved {
        return Err(CaptureError::CancelledByUser);
    }

    // From here on a stop is queued for `supervise` instead of ending the
    // process, so the channel below is always removed
    let (tx, rx) = mpsc::channel();
    let _route = stop.route_to(tx.clone());

    let log_path = plan.artifacts.log.as_path();
    let mut log = SessionLog::open(log_path).map_err(|e| {
        start_failed(format!("cannot open log {}: {}", log_path.display(), e), None)
    })?;

    let channel = TransientChannel::create().map_err(|e| {
        start_failed(format!("cannot create preview channel: {}", e), Some(log_path))
    })?;
    session.channel_path = Some(channel.path().to_path_buf());
    let preview = plan.preview(channel.path());

    let header = [
        format!("vhs-capture {}", app_info::version()),
        format!("Detected standard: {}", plan.standard),
        format!("Encoder profile: {}", plan.profile.display_name()),
        format!("Encoder command: {}", plan.encoder),
        format!("Preview command: {}", preview),
        format!("Intermediate file: {}", plan.artifacts.intermediate.display()),
    ];
    let written = log
        .section("Capture")
        .and_then(|_| header.iter().try_for_each(|line| log.line(line)));
    if let Err(e) = written {
        return Err(start_failed(format!("cannot write log: {}", e), Some(log_path)));
    }

    let intermediate = File::create(&plan.artifacts.intermediate).map_err(|e| {
        start_failed(
            format!("cannot create {}: {}", plan.artifacts.intermediate.display(), e),
            Some(log_path),
        )
    })?;

    let sink = log
        .child_sink()
        .map_err(|e| start_failed(format!("cannot attach log: {}", e), Some(log_path)))?;
    let mut child = process::command(&plan.encoder.program, &plan.encoder.args)
        .stdout(Stdio::piped())
        .stderr(sink)
        .spawn()
        .map_err(|e| {
            log.note(&format!("Failed to start encoder: {}", e));
            start_failed(
                format!("cannot start {}: {}", plan.encoder.program, e),
                Some(log_path),
            )
        })?;

    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(start_failed("encoder stdout unavailable".to_string(), Some(log_path)));
    };
    let fan_out = FanOut::start(stdout, intermediate, &channel);
    session.encoder = Some(WatchedChild::watch(child, Role::Encoder, tx.clone()));
    session.transition(SessionState::Running);
    info!(pid = ?session.encoder_pid(), "Encoder started");

    let preview_child = log.child_sink().and_then(|sink| {
        process::command(&preview.program, &preview.args)
            .stdout(Stdio::null())
            .stderr(sink)
            .spawn()
    });
    match preview_child {
        Ok(child) => {
            session.preview = Some(WatchedChild::watch(child, Role::Preview, tx));
            info!(pid = ?session.preview_pid(), "Preview started");
        }
        Err(e) => {
            drop(tx);
            warn!(error = %e, "Preview could not be started");
            log.note(&format!("Failed to start preview: {}", e));
            println!("Preview unavailable ({}); capturing without it.", e);
        }
    }

    println!("Capturing to {}", plan.artifacts.intermediate.display());
    println!("Press Ctrl+C to stop.");

    session.supervise(&rx, stop, &mut log);

    let persisted = fan_out.finish();
    drop(channel);
    let outcome = session.state;
    session.outcome = Some(outcome);
    session.transition(SessionState::Reaped);

    match (outcome, persisted) {
        (SessionState::UserStopped, Ok(bytes)) if session.expected_termination => {
            log.note(&format!("Capture stopped by user, {} bytes written", bytes));
            println!("Capture stopped.");
            Ok(CaptureSummary {
                bytes_written: bytes,
                intermediate: plan.artifacts.intermediate.clone(),
                log: log_path.to_path_buf(),
            })
        }
        (SessionState::UserStopped, Err(e)) => {
            log.note(&format!("Writing the capture failed: {}", e));
            Err(start_failed(
                format!("writing {} failed: {}", plan.artifacts.intermediate.display(), e),
                Some(log_path),
            ))
        }
        _ => {
            let status = session
                .encoder_status
                .clone()
                .unwrap_or_else(|| "unknown status".to_string());
            log.note(&format!("Capture failed: encoder exited on its own ({})", status));
            Err(start_failed(
                format!("encoder exited unexpectedly ({})", status),
                Some(log_path),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Session that is already capturing with `script` as its encoder
    fn running(script: &str) -> (Session, Receiver<ChildEvent>) {
        let (tx, rx) = mpsc::channel();
        let child = process::command("sh", &["-c".to_string(), script.to_string()])
            .spawn()
            .unwrap();

        let mut session = Session::new();
        session.encoder = Some(WatchedChild::watch(child, Role::Encoder, tx));
        session.transition(SessionState::Running);
        (session, rx)
    }

    #[test]
    fn test_encoder_exit_after_stop_request_is_user_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::open(&dir.path().join("session.log")).unwrap();

        // Requested but not yet delivered as an event when the exit is seen
        let stop = StopSignal::new();
        assert!(!stop.raise());

        let (mut session, rx) = running("exit 0");
        session.supervise(&rx, &stop, &mut log);

        assert_eq!(session.state(), SessionState::UserStopped);
        assert!(session.expected_termination);
        assert_eq!(session.encoder_status.as_deref(), Some("exit code 0"));
    }

    #[test]
    fn test_encoder_exit_without_stop_request_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::open(&dir.path().join("session.log")).unwrap();
        let stop = StopSignal::new();

        let (mut session, rx) = running("exit 0");
        session.supervise(&rx, &stop, &mut log);

        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.expected_termination);
    }

    #[test]
    fn test_stop_queued_before_running_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::open(&dir.path().join("session.log")).unwrap();
        let stop = StopSignal::new();

        let (tx, rx) = mpsc::channel();
        let _route = stop.route_to(tx.clone());
        assert!(stop.raise());

        let child = process::command("sh", &["-c".to_string(), "sleep 30".to_string()])
            .spawn()
            .unwrap();
        let mut session = Session::new();
        session.encoder = Some(WatchedChild::watch(child, Role::Encoder, tx));
        session.transition(SessionState::Running);
        session.supervise(&rx, &stop, &mut log);

        assert_eq!(session.state(), SessionState::UserStopped);
        assert!(session.expected_termination);
        let pid = session.encoder_pid().unwrap();
        assert!(!process::is_alive(pid));
    }
}
