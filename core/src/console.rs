//! Emulator core contract
//!
//! The emulation core (frame stepping, save states, video/audio production)
//! lives outside this crate. Recorders and replayers only talk to it through
//! the [`EmulatorCore`] trait.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Frame rate expressed as a rational number.
///
/// Stored as numerator/denominator so every platform derives the same
/// per-frame timing without float drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// GBA refresh rate: 16.78 MHz master clock / 280896 cycles per frame (~59.7275 fps)
    pub const GBA: FrameRate = FrameRate {
        num: 16_777_216,
        den: 280_896,
    };

    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Frames per second as a float. A zero denominator yields 0.0.
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::GBA
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// GBA key bitmask bits, as consumed by [`EmulatorCore::set_keys`].
pub mod keys {
    pub const A: u32 = 1 << 0;
    pub const B: u32 = 1 << 1;
    pub const SELECT: u32 = 1 << 2;
    pub const START: u32 = 1 << 3;
    pub const RIGHT: u32 = 1 << 4;
    pub const LEFT: u32 = 1 << 5;
    pub const UP: u32 = 1 << 6;
    pub const DOWN: u32 = 1 << 7;
    pub const R: u32 = 1 << 8;
    pub const L: u32 = 1 << 9;

    /// Every defined key bit.
    pub const ALL: u32 = 0x3FF;
}

/// Bytes per pixel of [`EmulatorCore::video_buffer`].
pub const BYTES_PER_PIXEL: usize = 4;

/// Interface to a loaded emulation core.
///
/// Implement this trait to record from, or replay into, an emulator.
pub trait EmulatorCore {
    /// Video width in pixels.
    fn width(&self) -> u32;

    /// Video height in pixels.
    fn height(&self) -> u32;

    /// Native frame rate.
    fn frame_rate(&self) -> FrameRate {
        FrameRate::GBA
    }

    /// Audio output sample rate in Hz.
    fn audio_sample_rate(&self) -> u32 {
        44_100
    }

    /// Number of interleaved audio channels.
    fn audio_channels(&self) -> u8 {
        2
    }

    /// Bits per audio sample.
    fn audio_bits(&self) -> u8 {
        16
    }

    /// Emulate exactly one frame.
    fn run_frame(&mut self) -> Result<()>;

    /// Current video frame, `width * height * 4` bytes, row-major.
    fn video_buffer(&self) -> &[u8];

    /// Drain the audio produced since the last call (interleaved s16le).
    fn audio_buffer(&mut self) -> Vec<u8>;

    /// Checksum of the loaded ROM.
    fn checksum(&self) -> u32;

    /// Four-character game code from the ROM header.
    fn game_code(&self) -> String;

    /// Path the ROM was loaded from, if known.
    fn rom_path(&self) -> Option<PathBuf> {
        None
    }

    /// Set the pressed-keys bitmask for the next frame.
    fn set_keys(&mut self, mask: u32);

    /// Write a save state snapshot to `path`.
    fn save_state_to_file(&mut self, path: &Path) -> Result<()>;

    /// Restore a save state snapshot from `path`.
    fn load_state_from_file(&mut self, path: &Path) -> Result<()>;
}
