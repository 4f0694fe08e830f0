//! Stats command - summarize a recording without decoding video

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gemba_core::RecordingStats;

/// Arguments for the stats command
#[derive(Args)]
pub struct StatsArgs {
    /// Recording to summarize (.grec)
    pub recording: PathBuf,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the stats command
pub fn execute(args: StatsArgs) -> Result<()> {
    let stats = gemba_core::stats(&args.recording)
        .with_context(|| format!("Failed to read recording: {}", args.recording.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render(&stats));
    }
    Ok(())
}

fn render(stats: &RecordingStats) -> String {
    let mut out = String::new();
    out.push_str("=== Recording ===\n");
    out.push_str(&format!("Frames: {}\n", stats.frame_count));
    if let Some(declared) = stats.footer_frame_count
        && u64::from(declared) != stats.frame_count
    {
        out.push_str(&format!("Footer frames: {} (stale)\n", declared));
    }
    out.push_str(&format!("Resolution: {}x{}\n", stats.width, stats.height));
    out.push_str(&format!("Frame rate: {:.4} fps\n", stats.fps));
    out.push_str(&format!("Duration: {:.2}s\n", stats.duration_secs));
    out.push_str(&format!("Avg change: {:.1}%\n", stats.avg_change_pct));
    out.push_str(&format!(
        "Video: {} raw, {} compressed ({:.1}x)\n",
        human_bytes(stats.raw_video_size),
        human_bytes(stats.compressed_video_size),
        ratio(stats.raw_video_size, stats.compressed_video_size)
    ));
    out.push_str(&format!(
        "Audio: {} ({} Hz, {} ch)\n",
        human_bytes(stats.audio_size),
        stats.audio_rate,
        stats.audio_channels
    ));
    out
}

fn ratio(raw: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        return 0.0;
    }
    raw as f64 / compressed as f64
}

fn human_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}
