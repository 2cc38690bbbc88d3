// SPDX-License-Identifier: GPL-3.0-only

//! Optional interactive trim of the final artifact

use super::timecode::Offset;
use super::tool_command;
use crate::errors::{CaptureError, CaptureResult};
use crate::process::{self, StopSignal, ToolError};
use crate::prompt::Prompter;
use crate::storage::{Artifacts, SessionLog, artifact_present};
use std::io;
use tracing::{debug, info, warn};

/// Start and end of the section to keep, end strictly after start
#[derive(Debug, Clone, PartialEq)]
pub struct TrimBounds {
    pub start: Offset,
    pub end: Offset,
}

impl TrimBounds {
    pub fn new(start: Offset, end: Offset) -> Option<Self> {
        (end.seconds() > start.seconds()).then_some(Self { start, end })
    }
}

/// Stream copy of `[start, end)` into the temporary trim artifact
pub fn trim_args(artifacts: &Artifacts, bounds: &TrimBounds) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        bounds.start.ffmpeg_arg().to_string(),
        "-to".to_string(),
        bounds.end.ffmpeg_arg().to_string(),
        "-i".to_string(),
        artifacts.final_path.display().to_string(),
        "-map".to_string(),
        "0".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        artifacts.trimmed.display().to_string(),
    ]
}

/// Ask until the answer parses; an empty answer takes `default` when there
/// is one
fn ask_offset(prompter: &mut dyn Prompter, question: &str, default: &str) -> io::Result<Offset> {
    loop {
        let answer = prompter.ask(question, default)?;
        let answer = if answer.trim().is_empty() && !default.is_empty() {
            default.to_string()
        } else {
            answer
        };
        match Offset::parse(&answer) {
            Ok(offset) => return Ok(offset),
            Err(e) => println!("{}", e),
        }
    }
}

/// Ask for both offsets, again from the start when end is not after start
pub fn ask_bounds(prompter: &mut dyn Prompter) -> io::Result<TrimBounds> {
    loop {
        let start = ask_offset(prompter, "Trim start", "00:00:00")?;
        let end = ask_offset(prompter, "Trim end", "")?;
        match TrimBounds::new(start, end) {
            Some(bounds) => return Ok(bounds),
            None => println!("The end must come after the start."),
        }
    }
}

/// Cut the final artifact down to `bounds`
///
/// Only the temporary artifact's presence counts as success. It then
/// replaces the final artifact with a rename; otherwise it is removed and
/// the final artifact is left as it was.
pub fn trim(
    artifacts: &Artifacts,
    bounds: &TrimBounds,
    ffmpeg: &str,
    log: &mut SessionLog,
    stop: &StopSignal,
) -> CaptureResult<()> {
    log.section("Trim")
        .map_err(|e| trim_failed(format!("cannot write log: {}", e), log))?;
    log.note(&format!("Keeping {} to {}", bounds.start, bounds.end));
    println!("Trimming {}...", artifacts.final_path.display());

    let cmd = tool_command(ffmpeg, &trim_args(artifacts, bounds), log)
        .map_err(|e| trim_failed(format!("cannot attach log: {}", e), log))?;
    let status = match process::run_tool(cmd, stop) {
        Ok(status) => process::describe_status(&status),
        Err(ToolError::Interrupted) => {
            log.note("Trim interrupted");
            remove_temp(artifacts);
            return Err(CaptureError::Interrupted);
        }
        Err(e) => e.to_string(),
    };
    log.note(&format!("Trim finished: {}", status));

    if !artifact_present(&artifacts.trimmed) {
        log.note("Trim produced no output, original kept");
        remove_temp(artifacts);
        return Err(trim_failed(
            format!("{} was not produced ({})", artifacts.trimmed.display(), status),
            log,
        ));
    }

    if let Err(e) = std::fs::rename(&artifacts.trimmed, &artifacts.final_path) {
        log.note(&format!("Could not replace the final file: {}", e));
        remove_temp(artifacts);
        return Err(trim_failed(
            format!("cannot replace {}: {}", artifacts.final_path.display(), e),
            log,
        ));
    }

    log.note("Trimmed file replaced the original");
    info!(path = %artifacts.final_path.display(), "Trim applied");
    Ok(())
}

fn trim_failed(reason: String, log: &SessionLog) -> CaptureError {
    CaptureError::TrimFailed {
        reason,
        log: log.path().to_path_buf(),
    }
}

fn remove_temp(artifacts: &Artifacts) {
    if let Err(e) = std::fs::remove_file(&artifacts.trimmed)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %artifacts.trimmed.display(), error = %e, "Failed to remove trim output");
    }
}

/// Offer the trim, show the recording and apply the chosen bounds
///
/// Returns whether the final artifact was trimmed. Declining at any prompt
/// keeps the untrimmed file and is not an error.
pub fn offer_trim(
    artifacts: &Artifacts,
    ffmpeg: &str,
    log: &mut SessionLog,
    prompter: &mut dyn Prompter,
    stop: &StopSignal,
) -> CaptureResult<bool> {
    let wanted = prompter
        .confirm("Trim the recording?", false)
        .map_err(|_| CaptureError::CancelledByUser)?;
    if !wanted {
        return Ok(false);
    }

    match open::that_detached(&artifacts.final_path) {
        Ok(()) => println!("Opened {} for review.", artifacts.final_path.display()),
        Err(e) => {
            debug!(error = %e, "Could not open the recording in a viewer");
            println!(
                "Could not open a viewer; review {} manually.",
                artifacts.final_path.display()
            );
        }
    }

    let bounds = ask_bounds(prompter).map_err(|_| CaptureError::CancelledByUser)?;
    let apply = prompter
        .confirm(
            &format!("Keep {} to {} and discard the rest?", bounds.start, bounds.end),
            true,
        )
        .map_err(|_| CaptureError::CancelledByUser)?;
    if !apply {
        log.note("Trim declined");
        return Ok(false);
    }

    trim(artifacts, &bounds, ffmpeg, log, stop)?;
    Ok(true)
}
