// SPDX-License-Identifier: GPL-3.0-only

//! Post-processing after a user-stopped capture
//!
//! Remux always runs; trim is offered only once the final artifact exists.
//! Each stage judges success by the file it was meant to produce.

pub mod remux;
pub mod timecode;
pub mod trim;

pub use remux::finalise;
pub use timecode::Offset;
pub use trim::{TrimBounds, offer_trim};

use crate::process;
use crate::storage::SessionLog;
use std::io;
use std::process::Command;

/// Short-lived ffmpeg run whose output goes to the session log
fn tool_command(program: &str, args: &[String], log: &SessionLog) -> io::Result<Command> {
    let mut cmd = process::command(program, args);
    cmd.stdout(log.child_sink()?).stderr(log.child_sink()?);
    Ok(cmd)
}
