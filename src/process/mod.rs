// SPDX-License-Identifier: GPL-3.0-only

//! Child process plumbing
//!
//! Children are started in their own process group so that a Ctrl+C at the
//! terminal reaches only this program, which then stops them in order. Each
//! child gets a waiter thread that reaps it and reports the exit on an event
//! channel shared with the stop signal, so the owner blocks on one `recv()`
//! instead of polling.

pub mod signal;

pub use signal::{StopRoute, StopSignal};

use std::fmt;
use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, warn};

/// Which child an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Encoder,
    Preview,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Encoder => "encoder",
            Role::Preview => "preview",
            Role::Tool => "tool",
        })
    }
}

/// Something a supervisor waits for
#[derive(Debug)]
pub enum ChildEvent {
    /// External stop request
    Interrupted,
    /// A watched child exited and has been reaped
    Exited {
        role: Role,
        status: io::Result<ExitStatus>,
    },
}

/// Describe an exit status for logs and messages
pub fn describe_status(status: &ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit code {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        _ => "unknown exit status".to_string(),
    }
}

/// Prepare a command the way every child of this tool is run
pub fn command(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).process_group(0);
    cmd
}

/// A spawned child whose exit is reported on an event channel
#[derive(Debug)]
pub struct WatchedChild {
    role: Role,
    pid: u32,
    exited: bool,
}

impl WatchedChild {
    /// Hand `child` to a waiter thread that reports its exit to `events`
    pub fn watch(mut child: Child, role: Role, events: Sender<ChildEvent>) -> Self {
        let pid = child.id();
        debug!(%role, pid, "Watching child process");

        thread::spawn(move || {
            let status = child.wait();
            // The receiver may already be gone if the owner bailed out early
            let _ = events.send(ChildEvent::Exited { role, status });
        });

        Self {
            role,
            pid,
            exited: false,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Record that the waiter reported this child's exit
    pub fn mark_exited(&mut self) {
        self.exited = true;
    }

    /// Ask the child's process group to stop with SIGTERM. No-op once the
    /// child has been reaped.
    pub fn terminate(&self) {
        if self.exited {
            return;
        }
        debug!(role = %self.role, pid = self.pid, "Sending SIGTERM");
        // The child leads its own group (see `command`), so helpers it
        // started are stopped with it
        let rc = unsafe { libc::kill(-(self.pid as libc::pid_t), libc::SIGTERM) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            // ESRCH: exited but not yet reaped by the waiter
            if err.raw_os_error() != Some(libc::ESRCH) {
                warn!(role = %self.role, pid = self.pid, error = %err, "Failed to signal child");
            }
        }
    }
}

/// Why [`run_tool`] did not return an exit status
#[derive(Debug)]
pub enum ToolError {
    /// The program could not be started
    Spawn(io::Error),
    /// Waiting for the program failed
    Wait(io::Error),
    /// A stop was requested; the tool was terminated and reaped
    Interrupted,
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Spawn(e) => write!(f, "failed to start: {}", e),
            ToolError::Wait(e) => write!(f, "failed to wait for process: {}", e),
            ToolError::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for ToolError {}

/// Run a short-lived tool to completion, stopping it on an interrupt
///
/// The tool is never left running: on a stop request it is terminated and
/// waited for before [`ToolError::Interrupted`] is returned.
pub fn run_tool(mut cmd: Command, stop: &StopSignal) -> Result<ExitStatus, ToolError> {
    let (tx, rx) = mpsc::channel();
    let _route = stop.route_to(tx.clone());

    let child = cmd.spawn().map_err(ToolError::Spawn)?;
    let mut tool = WatchedChild::watch(child, Role::Tool, tx);

    let mut interrupted = false;
    loop {
        match rx.recv() {
            Ok(ChildEvent::Interrupted) => {
                interrupted = true;
                tool.terminate();
            }
            Ok(ChildEvent::Exited { status, .. }) => {
                tool.mark_exited();
                if interrupted {
                    return Err(ToolError::Interrupted);
                }
                return status.map_err(ToolError::Wait);
            }
            // Unreachable while `_route` holds a sender
            Err(_) => return Err(ToolError::Interrupted),
        }
    }
}

/// Whether a process with this pid still exists (zombies included)
pub fn is_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}
