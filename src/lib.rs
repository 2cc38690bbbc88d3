// SPDX-License-Identifier: GPL-3.0-only

//! VHS Capture - digitise VHS tapes from a V4L2 capture card
//!
//! The library gathers and validates capture parameters, detects the analog
//! standard of the capture device, runs ffmpeg with a live ffplay preview and
//! post-processes the recording into its final container.
//!
//! # Architecture
//!
//! - [`validation`]: raw field values to a [`CaptureConfig`]
//! - [`backends`]: video, audio and hardware-encoder discovery
//! - [`pipelines`]: the capture session and post-processing stages
//! - [`process`]: child process supervision and stop requests
//! - [`storage`]: artifact paths and the per-session log
//! - [`config`]: persisted settings

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod process;
pub mod prompt;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use config::{CaptureConfig, Config};
pub use constants::Preset;
pub use errors::{CaptureError, CaptureResult};
pub use process::StopSignal;
pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
