// SPDX-License-Identifier: GPL-3.0-only

//! Hardware encoder detection
//!
//! VAAPI is the only acceleration backend used. It needs both ffmpeg support
//! (`-hwaccels`) and a DRM render node to open.

use crate::config::Tools;
use crate::errors::{CaptureError, CaptureResult};
use crate::prompt::Prompter;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// hwaccel name reported by ffmpeg
const VAAPI: &str = "vaapi";

/// Directory holding DRM device nodes
const DRI_DIR: &str = "/dev/dri";

/// Encoder profile chosen for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccelerationProfile {
    /// libx264 on the CPU
    Software,
    /// h264_vaapi on the given render node
    Vaapi { render_node: PathBuf },
}

impl AccelerationProfile {
    pub fn display_name(&self) -> String {
        match self {
            AccelerationProfile::Software => "software (libx264)".to_string(),
            AccelerationProfile::Vaapi { render_node } => {
                format!("VAAPI ({})", render_node.display())
            }
        }
    }
}

/// Parse the method list printed by `ffmpeg -hwaccels`
pub fn parse_hwaccels(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip_while(|line| !line.starts_with("Hardware acceleration methods"))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ask ffmpeg which hwaccel methods it was built with
pub fn detect_hwaccels(ffmpeg: &str) -> Vec<String> {
    let output = match Command::new(ffmpeg)
        .args(["-hide_banner", "-hwaccels"])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            warn!("Failed to run {} -hwaccels: {}", ffmpeg, e);
            return Vec::new();
        }
    };

    let methods = parse_hwaccels(&String::from_utf8_lossy(&output.stdout));
    debug!(?methods, "Detected hwaccel methods");
    methods
}

/// Check udev properties for membership of the DRM subsystem
pub fn is_drm_device(properties: &str) -> bool {
    properties
        .lines()
        .any(|line| line.trim() == "SUBSYSTEM=drm")
}

/// Render node candidates (`/dev/dri/renderD*`), sorted
fn render_node_candidates(dri_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dri_dir) else {
        return Vec::new();
    };

    let mut nodes: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("renderD"))
        .map(|e| e.path())
        .collect();
    nodes.sort();
    nodes
}

/// First render node that udev places in the DRM subsystem
pub fn find_render_node(udevadm: &str) -> Option<PathBuf> {
    for node in render_node_candidates(Path::new(DRI_DIR)) {
        let output = Command::new(udevadm)
            .args(["info", "--query=property"])
            .arg(format!("--name={}", node.display()))
            .output();

        match output {
            Ok(output) if output.status.success() => {
                if is_drm_device(&String::from_utf8_lossy(&output.stdout)) {
                    debug!(node = %node.display(), "Found DRM render node");
                    return Some(node);
                }
            }
            Ok(_) => debug!(node = %node.display(), "udevadm query failed"),
            Err(e) => {
                warn!("Failed to run {}: {}", udevadm, e);
                return None;
            }
        }
    }
    None
}

/// Decide once per session whether to encode on the GPU
pub fn select_acceleration(
    tools: &Tools,
    prompter: &mut dyn Prompter,
    force_software: bool,
) -> CaptureResult<AccelerationProfile> {
    if force_software {
        info!("Hardware acceleration disabled on the command line");
        return Ok(AccelerationProfile::Software);
    }

    match probe_hardware(tools) {
        Some(render_node) => choose_profile(render_node, prompter),
        None => Ok(AccelerationProfile::Software),
    }
}

/// Render node usable for VAAPI encoding, if ffmpeg and the system both
/// support it
pub fn probe_hardware(tools: &Tools) -> Option<PathBuf> {
    if !detect_hwaccels(&tools.ffmpeg).iter().any(|m| m == VAAPI) {
        info!("ffmpeg has no VAAPI support, using software encoding");
        return None;
    }

    let render_node = find_render_node(&tools.udevadm);
    if render_node.is_none() {
        info!("No DRM render node found, using software encoding");
    }
    render_node
}

/// Consent step of [`select_acceleration`]
pub fn choose_profile(
    render_node: PathBuf,
    prompter: &mut dyn Prompter,
) -> CaptureResult<AccelerationProfile> {
    let question = format!(
        "Hardware encoding is available on {}. Use it?",
        render_node.display()
    );
    let accepted = prompter
        .confirm(&question, true)
        .map_err(|_| CaptureError::CancelledByUser)?;

    let profile = if accepted {
        AccelerationProfile::Vaapi { render_node }
    } else {
        AccelerationProfile::Software
    };
    info!(profile = %profile.display_name(), "Selected encoder profile");
    Ok(profile)
}
