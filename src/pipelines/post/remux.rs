// SPDX-License-Identifier: GPL-3.0-only

//! Stream-copy the intermediate transport stream into the final container

use super::tool_command;
use crate::errors::{CaptureError, CaptureResult};
use crate::process::{self, StopSignal, ToolError};
use crate::storage::{Artifacts, SessionLog, artifact_present};
use tracing::{info, warn};

/// `-map 0 -c copy` from `<base>.ts` to `<base>.mkv`
pub fn remux_args(artifacts: &Artifacts) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        artifacts.intermediate.display().to_string(),
        "-map".to_string(),
        "0".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        artifacts.final_path.display().to_string(),
    ]
}

/// Produce the final artifact and drop the intermediate one
///
/// The tool's exit code is logged but only the final file decides success;
/// ffmpeg can exit non-zero after writing a usable file and vice versa. On
/// failure the intermediate is kept for recovery.
pub fn finalise(
    artifacts: &Artifacts,
    ffmpeg: &str,
    log: &mut SessionLog,
    stop: &StopSignal,
) -> CaptureResult<()> {
    let args = remux_args(artifacts);
    log.section("Remux").map_err(|e| CaptureError::FinaliseFailed {
        reason: format!("cannot write log: {}", e),
        log: log.path().to_path_buf(),
    })?;
    println!("Finalising {}...", artifacts.final_path.display());

    let cmd = tool_command(ffmpeg, &args, log).map_err(|e| CaptureError::FinaliseFailed {
        reason: format!("cannot attach log: {}", e),
        log: log.path().to_path_buf(),
    })?;
    let status = match process::run_tool(cmd, stop) {
        Ok(status) => process::describe_status(&status),
        Err(ToolError::Interrupted) => {
            log.note("Remux interrupted");
            return Err(CaptureError::Interrupted);
        }
        Err(e) => e.to_string(),
    };
    log.note(&format!("Remux finished: {}", status));

    if !artifact_present(&artifacts.final_path) {
        log.note("Remux produced no output, intermediate kept");
        // Only the intermediate may remain; drop an empty leftover
        if artifacts.final_path.is_file() {
            let _ = std::fs::remove_file(&artifacts.final_path);
        }
        return Err(CaptureError::FinaliseFailed {
            reason: format!("{} was not produced ({})", artifacts.final_path.display(), status),
            log: log.path().to_path_buf(),
        });
    }

    match std::fs::remove_file(&artifacts.intermediate) {
        Ok(()) => log.note("Intermediate removed"),
        Err(e) => {
            warn!(
                path = %artifacts.intermediate.display(),
                error = %e,
                "Failed to remove intermediate"
            );
            log.note(&format!("Could not remove intermediate: {}", e));
        }
    }
    info!(path = %artifacts.final_path.display(), "Final artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_remux_args() {
        let artifacts = Artifacts::new(Path::new("/tapes"), "Test.mkv");
        let args = remux_args(&artifacts);
        let joined = args.join(" ");
        assert!(joined.contains("-nostdin -y -i /tapes/Test.ts -map 0 -c copy"));
        assert_eq!(args.last().map(String::as_str), Some("/tapes/Test.mkv"));
    }
}
