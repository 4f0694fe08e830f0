//! Check command - verify an input log matches a ROM checksum

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gemba_core::{InputReplayer, ReplayError};

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Input log to check (.gir)
    pub log: PathBuf,

    /// ROM checksum, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_checksum)]
    pub checksum: u32,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let replayer = InputReplayer::open(&args.log)
        .with_context(|| format!("Failed to parse input log: {}", args.log.display()))?;

    let expected = replayer.rom_checksum();
    if expected != args.checksum {
        return Err(ReplayError::ChecksumMismatch {
            expected,
            actual: args.checksum,
        }
        .into());
    }

    println!(
        "OK: {} matches ROM {:#010x} ({} frames)",
        args.log.display(),
        expected,
        replayer.frame_count()
    );
    Ok(())
}

fn parse_checksum(value: &str) -> Result<u32, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid checksum '{}': {}", value, e))
}
