// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

mod cli;

#[derive(Parser)]
#[command(name = "vhs-capture")]
#[command(about = "Digitise VHS tapes from a V4L2 capture card with live preview")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    capture: CaptureArgs,

    /// Show debug diagnostics (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a tape (the default)
    Capture(CaptureArgs),

    /// List capture devices and hardware encoder support
    Devices,
}

/// Field values given up front; anything left out is asked for
#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Video device node (e.g. /dev/video0)
    #[arg(long)]
    pub video: Option<String>,

    /// ALSA capture device as card:device (e.g. 1:0)
    #[arg(long)]
    pub audio: Option<String>,

    /// Audio bitrate in kbps (32-320)
    #[arg(long)]
    pub bitrate: Option<String>,

    /// Quality factor (0-51, lower is better)
    #[arg(long)]
    pub quality: Option<String>,

    /// x264 preset (ultrafast ... placebo)
    #[arg(long)]
    pub preset: Option<String>,

    /// Output directory (default: ~/Videos/vhs)
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Output filename (default: vhs_TIMESTAMP.mkv)
    #[arg(long)]
    pub name: Option<String>,

    /// Never use hardware encoding
    #[arg(long)]
    pub software: bool,

    /// Skip the trim step
    #[arg(long)]
    pub no_trim: bool,

    /// Answer every confirmation with its default
    #[arg(short, long)]
    pub yes: bool,

    /// Use defaults for fields not given instead of asking
    #[arg(long)]
    pub defaults: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set RUST_LOG to control the log level, e.g. RUST_LOG=vhs_capture=trace
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let result = match cli.command {
        Some(Commands::Capture(args)) => cli::capture(args),
        Some(Commands::Devices) => cli::list_devices(),
        None => cli::capture(cli.capture),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(log) = e.log_path() {
                eprintln!("Details are in {}", log.display());
            }
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
