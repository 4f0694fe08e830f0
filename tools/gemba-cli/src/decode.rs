//! Decode command - convert a recording to a video file

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gemba_core::{CaptureSettings, DecodeOptions};

/// Arguments for the decode command
#[derive(Args)]
pub struct DecodeArgs {
    /// Recording to decode (.grec)
    pub input: PathBuf,

    /// Output video file; the container follows the extension
    pub output: PathBuf,

    /// Integer upscale factor (nearest-neighbour)
    #[arg(long)]
    pub scale: Option<u32>,

    /// Video codec passed to ffmpeg
    #[arg(long)]
    pub video_codec: Option<String>,

    /// Audio codec passed to ffmpeg
    #[arg(long)]
    pub audio_codec: Option<String>,

    /// Encoder binary (default: ffmpeg on PATH)
    #[arg(long)]
    pub encoder: Option<PathBuf>,
}

impl DecodeArgs {
    /// Command-line flags override the settings file.
    fn options(&self, settings: &CaptureSettings) -> DecodeOptions {
        let mut options = settings.decode.clone();
        if let Some(scale) = self.scale {
            options.scale = scale.max(1);
        }
        if let Some(codec) = &self.video_codec {
            options.video_codec = codec.clone();
        }
        if let Some(codec) = &self.audio_codec {
            options.audio_codec = codec.clone();
        }
        if let Some(encoder) = &self.encoder {
            options.encoder = Some(encoder.clone());
        }
        options
    }
}

/// Execute the decode command
pub fn execute(args: DecodeArgs, settings: &CaptureSettings) -> Result<()> {
    let options = args.options(settings);
    tracing::debug!(
        "Encoder options: scale {}, video {}, audio {}",
        options.scale,
        options.video_codec,
        options.audio_codec
    );

    println!("Decoding: {}", args.input.display());

    let mut last_percent = None;
    let mut progress = |fraction: f64| {
        let percent = (fraction * 100.0) as u32;
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            print!("\r  {:>3}%", percent);
            let _ = std::io::stdout().flush();
        }
    };

    let summary = gemba_core::decode(&args.input, &args.output, &options, Some(&mut progress))
        .with_context(|| format!("Failed to decode {}", args.input.display()))?;
    println!();

    println!();
    println!("=== Decode Complete ===");
    println!("Output: {}", summary.output_path.display());
    println!("Frames: {}", summary.frame_count);
    println!(
        "Resolution: {}x{} (x{})",
        summary.width, summary.height, options.scale
    );
    println!("Frame rate: {:.4} fps", summary.fps);
    println!("Avg change: {:.1}%", summary.avg_change_pct);
    Ok(())
}
