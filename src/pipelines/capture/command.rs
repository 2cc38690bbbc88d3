// SPDX-License-Identifier: GPL-3.0-only

//! Encoder and preview argument vectors
//!
//! Two templates exist, one per [`AccelerationProfile`]. Both read the video
//! and audio legs at the detected standard's size and rate and write MPEG-TS
//! to stdout; the session fans that stream out to disk and to the preview.

use crate::backends::accel::AccelerationProfile;
use crate::backends::video::DetectedStandard;
use crate::config::CaptureConfig;
use crate::constants::encoding::{
    AUDIO_ASYNC_SAMPLES, AUDIO_CHANNELS, AUDIO_CODEC, AUDIO_SAMPLE_RATE, CAPTURE_PIXEL_FORMAT,
    STREAM_FORMAT, THREAD_QUEUE_SIZE,
};
use std::fmt;
use std::path::Path;

/// Program plus arguments, ready to hand to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    /// Shell-style command line, quoting arguments that need it
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Video and audio input legs
fn input_args(config: &CaptureConfig, standard: &DetectedStandard) -> Vec<String> {
    let queue = THREAD_QUEUE_SIZE.to_string();
    let mut args = strings(&["-f", "v4l2", "-thread_queue_size", &queue]);
    args.extend(strings(&[
        "-input_format",
        CAPTURE_PIXEL_FORMAT,
        "-video_size",
        &standard.format.size_arg(),
        "-framerate",
        &standard.framerate_arg(),
    ]));
    args.push("-i".to_string());
    args.push(config.video_device.display().to_string());

    args.extend(strings(&[
        "-f",
        "alsa",
        "-thread_queue_size",
        &queue,
        "-channels",
        &AUDIO_CHANNELS.to_string(),
        "-sample_rate",
        &AUDIO_SAMPLE_RATE.to_string(),
        "-i",
        &config.audio_device.alsa_name(),
    ]));
    args
}

/// Stream mapping, constant frame rate and audio drift correction
fn timing_args(standard: &DetectedStandard) -> Vec<String> {
    strings(&[
        "-map",
        "0:v:0",
        "-map",
        "1:a:0",
        "-fps_mode",
        "cfr",
        "-r",
        &standard.framerate_arg(),
        "-af",
        &format!("aresample=async={}", AUDIO_ASYNC_SAMPLES),
    ])
}

/// Interlaced encoding with the top field first
fn interlace_args() -> Vec<String> {
    strings(&["-flags", "+ilme+ildct", "-field_order", "tt"])
}

/// Audio encoder and the streaming output sink
fn output_args(config: &CaptureConfig) -> Vec<String> {
    strings(&[
        "-c:a",
        AUDIO_CODEC,
        "-b:a",
        &format!("{}k", config.audio_bitrate),
        "-ar",
        &AUDIO_SAMPLE_RATE.to_string(),
        "-ac",
        &AUDIO_CHANNELS.to_string(),
        "-f",
        STREAM_FORMAT,
        "pipe:1",
    ])
}

/// libx264 template: CRF quality, preset honoured
pub fn software_args(config: &CaptureConfig, standard: &DetectedStandard) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-nostdin", "-nostats", "-loglevel", "warning"]);
    args.extend(input_args(config, standard));
    args.extend(timing_args(standard));
    args.extend(strings(&[
        "-vf",
        "setfield=tff,format=yuv420p",
        "-c:v",
        "libx264",
        "-preset",
        config.preset.as_str(),
        "-crf",
        &config.quality.to_string(),
    ]));
    args.extend(interlace_args());
    args.extend(strings(&["-x264-params", "tff=1:weightp=0"]));
    args.extend(output_args(config));
    args
}

/// h264_vaapi template: QP quality, no preset, frames uploaded to the GPU
///
/// h264_vaapi never uses weighted prediction, so there is no switch for it.
pub fn hardware_args(
    config: &CaptureConfig,
    standard: &DetectedStandard,
    render_node: &Path,
) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-nostdin", "-nostats", "-loglevel", "warning"]);
    args.push("-vaapi_device".to_string());
    args.push(render_node.display().to_string());
    args.extend(input_args(config, standard));
    args.extend(timing_args(standard));
    args.extend(strings(&[
        "-vf",
        "setfield=tff,format=nv12,hwupload",
        "-c:v",
        "h264_vaapi",
        "-qp",
        &config.quality.to_string(),
    ]));
    args.extend(interlace_args());
    args.extend(output_args(config));
    args
}

/// Pick the template for the session's profile
pub fn build_capture_args(
    config: &CaptureConfig,
    standard: &DetectedStandard,
    profile: &AccelerationProfile,
) -> Vec<String> {
    match profile {
        AccelerationProfile::Software => software_args(config, standard),
        AccelerationProfile::Vaapi { render_node } => {
            hardware_args(config, standard, render_node)
        }
    }
}

/// Low-latency preview reading the live stream from `source`
pub fn preview_args(source: &Path) -> Vec<String> {
    let mut args = strings(&[
        "-hide_banner",
        "-loglevel",
        "error",
        "-fflags",
        "nobuffer",
        "-flags",
        "low_delay",
        "-framedrop",
        "-window_title",
        "VHS capture preview",
    ]);
    args.push(source.display().to_string());
    args
}
