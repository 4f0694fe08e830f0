//! Gemba Core - Session capture and replay
//!
//! This crate records emulator sessions in two complementary forms and plays
//! them back.
//!
//! # Architecture
//!
//! - [`EmulatorCore`] - Trait the emulation core implements
//! - [`recording`] - Delta-compressed audio/video container (`.grec`), its
//!   background writer and the ffmpeg-backed decoder
//! - [`replay`] - Text input log (`.gir`) anchored to a save state
//! - [`config`] - User settings for both pipelines

pub mod config;
pub mod console;
pub mod delta;
#[cfg(test)]
mod integration;
pub mod recording;
pub mod replay;
#[cfg(test)]
pub mod test_utils;

// Re-export core traits and types
pub use config::{CaptureSettings, InputSettings, RecordingSettings};
pub use console::{BYTES_PER_PIXEL, EmulatorCore, FrameRate, keys};
pub use delta::{DeltaError, change_percent, count_changed_pixels, xor_delta, xor_in_place};

// Re-export recording types
pub use recording::{
    DecodeError, DecodeOptions, DecodeSummary, RecordError, Recorder, RecorderConfig,
    RecordingReport, RecordingStats, decode, decode_frames, stats,
};

// Re-export replay types
pub use replay::{InputRecordError, InputRecorder, InputRecorderConfig, InputReplayer, ReplayError};
