// SPDX-License-Identifier: GPL-3.0-only

//! Hardware and tool queries
//!
//! - [`video`]: V4L2 device enumeration and standard detection
//! - [`audio`]: ALSA capture device enumeration
//! - [`accel`]: hardware encoder availability and selection

pub mod accel;
pub mod audio;
pub mod video;

use crate::config::Tools;
use crate::errors::{CaptureError, CaptureResult};
use tracing::debug;

/// Make sure every program the capture needs can be found on `PATH`
///
/// `udevadm` is left out; without it hardware encoding is simply not offered.
pub fn check_dependencies(tools: &Tools) -> CaptureResult<()> {
    for program in [&tools.ffmpeg, &tools.ffplay, &tools.arecord] {
        match which::which(program) {
            Ok(path) => debug!(program = %program, path = %path.display(), "Found dependency"),
            Err(e) => {
                debug!(program = %program, error = %e, "Dependency lookup failed");
                return Err(CaptureError::MissingDependency(program.clone()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_is_named() {
        let tools = Tools {
            ffmpeg: "sh".to_string(),
            ffplay: "vhs-capture-no-such-preview".to_string(),
            arecord: "sh".to_string(),
            udevadm: "sh".to_string(),
        };
        assert_eq!(
            check_dependencies(&tools),
            Err(CaptureError::MissingDependency(
                "vhs-capture-no-such-preview".to_string()
            ))
        );
    }

    #[test]
    fn test_present_dependencies_pass() {
        let tools = Tools {
            ffmpeg: "sh".to_string(),
            ffplay: "sh".to_string(),
            arecord: "sh".to_string(),
            udevadm: "sh".to_string(),
        };
        assert!(check_dependencies(&tools).is_ok());
    }
}
