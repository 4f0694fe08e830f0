//! Gemba CLI - Inspect and decode session recordings
//!
//! # Commands
//!
//! - `gemba stats` - Summarize a `.grec` recording without decoding video
//! - `gemba decode` - Convert a `.grec` recording to a video file via ffmpeg
//! - `gemba inspect` - Show the header and first frames of a `.gir` input log
//! - `gemba check` - Verify a `.gir` input log belongs to a ROM checksum
//!
//! # Usage
//!
//! ```bash
//! gemba stats session.grec --json
//! gemba decode session.grec session.mp4 --scale 3
//! gemba inspect session.gir
//! gemba check session.gir --checksum 0xdeadbeef
//! ```
//!
//! Settings are read from `capture.toml` in the platform config directory,
//! or from the file given with `--config`.

mod check;
mod decode;
mod inspect;
mod stats;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gemba_core::CaptureSettings;

/// Gemba CLI - Inspect and decode session recordings
#[derive(Parser)]
#[command(name = "gemba")]
#[command(about = "Inspect and decode Gemba session recordings")]
#[command(version)]
struct Cli {
    /// Settings file (default: capture.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a .grec recording
    Stats(stats::StatsArgs),

    /// Decode a .grec recording into a video file
    Decode(decode::DecodeArgs),

    /// Show the contents of a .gir input log
    Inspect(inspect::InspectArgs),

    /// Check a .gir input log against a ROM checksum
    Check(check::CheckArgs),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            CaptureSettings::load(path)
                .with_context(|| format!("Failed to load settings: {}", path.display()))?
        }
        None => CaptureSettings::load_default(),
    };

    match cli.command {
        Commands::Stats(args) => stats::execute(args),
        Commands::Decode(args) => decode::execute(args, &settings),
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Check(args) => check::execute(args),
    }
}
