//! Input log replayer
//!
//! Parses a `.gir` log up front, then feeds its key bitmasks into a core
//! restored from the anchor state.

use std::io;
use std::path::{Path, PathBuf};

use crate::console::EmulatorCore;

use super::format::{InputLogHeader, SEPARATOR, is_banner, parse_bitmask, parse_header_line};

/// Replay errors
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Not a Gemba input recording")]
    BadBanner,

    #[error("Header is not terminated by '---'")]
    MissingSeparator,

    #[error("Missing header field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value for '{field}': {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Line {line}: invalid key bitmask {text:?}")]
    InvalidBitmask { line: usize, text: String },

    #[error("ROM checksum mismatch: recording expects {expected:#010x}, loaded ROM is {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Emulator core error: {0:#}")]
    Core(anyhow::Error),
}

/// Parsed `.gir` log with a playback cursor
#[derive(Debug, Clone)]
pub struct InputReplayer {
    header: InputLogHeader,
    anchor_path: PathBuf,
    bitmasks: Vec<u32>,
    cursor: usize,
}

impl InputReplayer {
    /// Read and parse a log from disk.
    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base_dir)
    }

    /// Parse log text. The anchor state is resolved against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, ReplayError> {
        let mut lines = text.lines().enumerate();

        match lines.next() {
            Some((_, first)) if is_banner(first) => {}
            _ => return Err(ReplayError::BadBanner),
        }

        // Phase 1: header up to the separator
        let mut rom_checksum = None;
        let mut anchor_state = None;
        let mut header = InputLogHeader::default();
        let mut separated = false;

        for (_, line) in lines.by_ref() {
            if line.trim() == SEPARATOR {
                separated = true;
                break;
            }
            let Some((key, value)) = parse_header_line(line) else {
                continue;
            };
            match key {
                "rom_checksum" => rom_checksum = Some(parse_checksum(value)?),
                "anchor_state" => anchor_state = Some(value.to_string()),
                "game_code" => header.game_code = value.to_string(),
                "rom_path" => header.rom_path = value.to_string(),
                // Advisory only
                "frame_count" => header.frame_count = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        if !separated {
            return Err(ReplayError::MissingSeparator);
        }
        header.rom_checksum = rom_checksum.ok_or(ReplayError::MissingField("rom_checksum"))?;
        header.anchor_state = anchor_state
            .filter(|name| !name.is_empty())
            .ok_or(ReplayError::MissingField("anchor_state"))?;

        // Only the file name is honoured; the anchor always sits beside the log
        let anchor_name = Path::new(&header.anchor_state)
            .file_name()
            .ok_or_else(|| ReplayError::InvalidField {
                field: "anchor_state",
                value: header.anchor_state.clone(),
            })?;
        let anchor_path = base_dir.join(anchor_name);

        // Phase 2: one bitmask per non-blank line
        let mut bitmasks = Vec::new();
        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let mask = parse_bitmask(line).ok_or_else(|| ReplayError::InvalidBitmask {
                line: index + 1,
                text: line.to_string(),
            })?;
            bitmasks.push(mask);
        }

        if header.frame_count != bitmasks.len() as u64 {
            tracing::debug!(
                "Input log declares {} frames, body holds {}",
                header.frame_count,
                bitmasks.len()
            );
        }

        Ok(Self {
            header,
            anchor_path,
            bitmasks,
            cursor: 0,
        })
    }

    pub fn header(&self) -> &InputLogHeader {
        &self.header
    }

    pub fn rom_checksum(&self) -> u32 {
        self.header.rom_checksum
    }

    /// Frames in the body; authoritative
    pub fn frame_count(&self) -> usize {
        self.bitmasks.len()
    }

    /// Frame count from the header, which may be stale after a crash
    pub fn declared_frame_count(&self) -> u64 {
        self.header.frame_count
    }

    pub fn anchor_path(&self) -> &Path {
        &self.anchor_path
    }

    /// Check that `core` has the ROM this log was recorded against.
    pub fn validate<C: EmulatorCore + ?Sized>(&self, core: &C) -> Result<(), ReplayError> {
        let actual = core.checksum();
        if actual != self.header.rom_checksum {
            return Err(ReplayError::ChecksumMismatch {
                expected: self.header.rom_checksum,
                actual,
            });
        }
        Ok(())
    }

    /// Bitmask for a zero-based frame
    pub fn bitmask_at(&self, frame: usize) -> Option<u32> {
        self.bitmasks.get(frame).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bitmasks.iter().copied()
    }

    /// Bitmask under the cursor, advancing it
    pub fn next_bitmask(&mut self) -> Option<u32> {
        let mask = self.bitmask_at(self.cursor)?;
        self.cursor += 1;
        Some(mask)
    }

    pub fn current_frame(&self) -> usize {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.bitmasks.len()
    }

    /// Playback progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.bitmasks.is_empty() {
            return 0.0;
        }
        self.cursor as f64 / self.bitmasks.len() as f64
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Validate the ROM, restore the anchor state and rewind.
    pub fn prepare<C: EmulatorCore + ?Sized>(&mut self, core: &mut C) -> Result<(), ReplayError> {
        self.validate(core)?;
        core.load_state_from_file(&self.anchor_path)
            .map_err(ReplayError::Core)?;
        self.rewind();
        Ok(())
    }

    /// Run one frame with the next bitmask. Returns false once the log is exhausted.
    pub fn step<C: EmulatorCore + ?Sized>(&mut self, core: &mut C) -> Result<bool, ReplayError> {
        let Some(mask) = self.next_bitmask() else {
            return Ok(false);
        };
        core.set_keys(mask);
        core.run_frame().map_err(ReplayError::Core)?;
        Ok(true)
    }

    /// Replay the whole log into `core`. Returns the number of frames stepped.
    pub fn replay<C: EmulatorCore + ?Sized>(&mut self, core: &mut C) -> Result<usize, ReplayError> {
        self.prepare(core)?;
        let mut stepped = 0;
        while self.step(core)? {
            stepped += 1;
        }
        tracing::info!("Replayed {} frames from {}", stepped, self.anchor_path.display());
        Ok(stepped)
    }
}

/// Decimal, or hex with a `0x` prefix
fn parse_checksum(value: &str) -> Result<u32, ReplayError> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    };
    parsed.ok_or_else(|| ReplayError::InvalidField {
        field: "rom_checksum",
        value: value.to_string(),
    })
}
