//! Inspect command - show the header and first frames of an input log

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gemba_core::InputReplayer;
use gemba_core::keys;

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Input log to inspect (.gir)
    pub log: PathBuf,

    /// Number of frames to list
    #[arg(long, default_value_t = 10)]
    pub frames: usize,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let replayer = InputReplayer::open(&args.log)
        .with_context(|| format!("Failed to parse input log: {}", args.log.display()))?;
    let header = replayer.header();

    println!("=== Input Log ===");
    println!("ROM checksum: {:#010x} ({})", header.rom_checksum, header.rom_checksum);
    println!("Game code: {}", header.game_code);
    if !header.rom_path.is_empty() {
        println!("ROM path: {}", header.rom_path);
    }
    let anchor = replayer.anchor_path();
    let anchor_found = anchor.exists();
    if !anchor_found {
        tracing::warn!(
            "Anchor state {} is missing; this log cannot be replayed",
            anchor.display()
        );
    }
    println!(
        "Anchor state: {}{}",
        anchor.display(),
        if anchor_found { "" } else { " (missing)" }
    );
    println!("Frames: {}", replayer.frame_count());
    if replayer.declared_frame_count() != replayer.frame_count() as u64 {
        println!(
            "Header frames: {} (stale; log was not closed cleanly)",
            replayer.declared_frame_count()
        );
    }

    let shown = args.frames.min(replayer.frame_count());
    if shown > 0 {
        println!();
        println!("First {} frames:", shown);
        for (frame, mask) in replayer.iter().take(shown).enumerate() {
            println!("  {:>6}: {:>4x}  {}", frame, mask, key_names(mask));
        }
    }
    Ok(())
}

fn key_names(mask: u32) -> String {
    const NAMES: [(u32, &str); 10] = [
        (keys::A, "A"),
        (keys::B, "B"),
        (keys::SELECT, "Select"),
        (keys::START, "Start"),
        (keys::RIGHT, "Right"),
        (keys::LEFT, "Left"),
        (keys::UP, "Up"),
        (keys::DOWN, "Down"),
        (keys::R, "R"),
        (keys::L, "L"),
    ];
    let pressed: Vec<&str> = NAMES
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if pressed.is_empty() {
        "-".to_string()
    } else {
        pressed.join("+")
    }
}
