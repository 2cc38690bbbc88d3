// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - `capture`: the interactive capture flow, from field entry to the final
//!   (optionally trimmed) recording
//! - `devices`: list capture hardware

use crate::CaptureArgs;
use chrono::Local;
use tracing::{info, warn};
use vhs_capture::backends::accel::{self, AccelerationProfile};
use vhs_capture::backends::audio::{AudioDevice, enumerate_audio_devices};
use vhs_capture::backends::video::{self, classify, enumerate_video_devices, query_format};
use vhs_capture::backends::check_dependencies;
use vhs_capture::config::{AudioDeviceId, Config};
use vhs_capture::constants::artifacts::FINAL_EXTENSION;
use vhs_capture::constants::defaults;
use vhs_capture::errors::{CaptureError, CaptureResult};
use vhs_capture::pipelines::capture::{
    Invocation, Session, SessionPlan, build_capture_args, run_session,
};
use vhs_capture::pipelines::post::{finalise, offer_trim};
use vhs_capture::process::StopSignal;
use vhs_capture::prompt::TerminalPrompter;
use vhs_capture::storage::{Artifacts, SessionLog};
use vhs_capture::validation::{self, FieldDefaults, RawInputs};

/// Capture one tape
pub fn capture(args: CaptureArgs) -> CaptureResult<()> {
    let stop = match StopSignal::install() {
        Ok(stop) => stop,
        Err(e) => {
            warn!(error = %e, "Could not install the interrupt handler");
            StopSignal::new()
        }
    };

    let settings = Config::load(Config::default_path().as_deref());
    let tools = &settings.tools;
    check_dependencies(tools)?;

    let video_devices = enumerate_video_devices();
    let audio_devices = enumerate_audio_devices(&tools.arecord);
    print_devices(&video_devices, &audio_devices);

    let field_defaults = FieldDefaults {
        video_device: video_devices
            .first()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        audio_device: audio_devices
            .first()
            .map(|d| d.id.to_string())
            .unwrap_or_default(),
        audio_bitrate: settings.audio_bitrate.to_string(),
        quality: settings.quality.to_string(),
        preset: settings.preset.to_string(),
        output_dir: settings.output_dir.clone(),
        filename: format!(
            "{}_{}.{}",
            defaults::FILENAME_PREFIX,
            Local::now().format("%Y%m%d_%H%M%S"),
            FINAL_EXTENSION
        ),
    };

    let given = RawInputs {
        video_device: args.video.unwrap_or_default(),
        audio_device: args.audio.unwrap_or_default(),
        audio_bitrate: args.bitrate.unwrap_or_default(),
        quality: args.quality.unwrap_or_default(),
        preset: args.preset.unwrap_or_default(),
        output_dir: args.output_dir.unwrap_or_default(),
        filename: args.name.unwrap_or_default(),
    };

    let mut prompter = TerminalPrompter::new(args.yes);
    let raw = RawInputs::collect(given, &field_defaults, &mut prompter, !args.defaults)?;
    let available: Vec<AudioDeviceId> = audio_devices.iter().map(|d| d.id).collect();
    let config = validation::validate(&raw, &field_defaults, &available, &mut prompter)?;

    let standard = video::detect_standard(&config.video_device, &mut prompter)?;
    println!("Detected {}", standard);
    let profile = accel::select_acceleration(tools, &mut prompter, args.software)?;
    println!("Encoding with {}", profile.display_name());

    let artifacts = Artifacts::new(&config.output_dir, &config.filename);
    let plan = SessionPlan {
        encoder: Invocation::new(
            tools.ffmpeg.clone(),
            build_capture_args(&config, &standard, &profile),
        ),
        preview_program: tools.ffplay.clone(),
        standard,
        profile,
        artifacts: artifacts.clone(),
    };

    let mut session = Session::new();
    let summary = run_session(&plan, &mut session, &mut prompter, &stop)?;
    info!(bytes = summary.bytes_written, "Capture finished");
    println!(
        "Captured {:.1} MiB to {}",
        summary.bytes_written as f64 / (1024.0 * 1024.0),
        summary.intermediate.display()
    );

    let mut log = SessionLog::open(&summary.log).map_err(|e| CaptureError::FinaliseFailed {
        reason: format!("cannot open log: {}", e),
        log: summary.log.clone(),
    })?;
    finalise(&artifacts, &tools.ffmpeg, &mut log, &stop)?;
    println!("Saved {}", artifacts.final_path.display());

    if !args.no_trim && offer_trim(&artifacts, &tools.ffmpeg, &mut log, &mut prompter, &stop)? {
        println!("Trimmed {}", artifacts.final_path.display());
    }

    log.note("Session complete");
    Ok(())
}

/// List capture devices, their current standard and hardware encoding support
pub fn list_devices() -> CaptureResult<()> {
    let settings = Config::load(Config::default_path().as_deref());
    let tools = &settings.tools;

    let video_devices = enumerate_video_devices();
    let audio_devices = enumerate_audio_devices(&tools.arecord);

    if video_devices.is_empty() {
        println!("No video devices found.");
    } else {
        println!("Video devices:");
        for device in &video_devices {
            match query_format(device) {
                Ok(format) => println!(
                    "  {}  {} {}",
                    device.display(),
                    format,
                    classify(&format).display_name()
                ),
                Err(e) => println!("  {}  (cannot query: {})", device.display(), e),
            }
        }
    }
    println!();

    print_audio_devices(&audio_devices);
    println!();

    let hardware = accel::probe_hardware(tools)
        .map(|render_node| AccelerationProfile::Vaapi { render_node });
    match hardware {
        Some(profile) => println!("Hardware encoding: {}", profile.display_name()),
        None => println!("Hardware encoding: not available"),
    }

    Ok(())
}

fn print_devices(video_devices: &[std::path::PathBuf], audio_devices: &[AudioDevice]) {
    if video_devices.is_empty() {
        println!("No video devices found.");
    } else {
        println!("Video devices:");
        for device in video_devices {
            println!("  {}", device.display());
        }
    }
    print_audio_devices(audio_devices);
    println!();
}

fn print_audio_devices(audio_devices: &[AudioDevice]) {
    if audio_devices.is_empty() {
        println!("No audio capture devices found.");
        return;
    }
    println!("Audio devices:");
    for device in audio_devices {
        println!("  {}  {}", device.id, device.name);
    }
}
