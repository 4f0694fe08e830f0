//! Audio/video recording (.grec)
//!
//! Rendered frames are stored as zlib-compressed XOR deltas against the
//! previous frame, next to the raw audio produced with each frame.
//!
//! # File Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (32 bytes)                            │
//! │  ├─ magic: "GEMBAREC"                        │
//! │  ├─ version: u8                              │
//! │  ├─ width, height: u16                       │
//! │  ├─ fps_num, fps_den: u32                    │
//! │  ├─ audio_rate: u32                          │
//! │  ├─ channels, bits: u8                       │
//! │  └─ reserved: [u8; 5]                        │
//! ├──────────────────────────────────────────────┤
//! │ Frame records (repeated)                     │
//! │  ├─ change_pct: u8                           │
//! │  ├─ video_len: u32, video: zlib(xor delta)   │
//! │  └─ audio_len: u32, audio: raw samples       │
//! ├──────────────────────────────────────────────┤
//! │ Footer (8 bytes, advisory)                   │
//! │  ├─ frame_count: u32                         │
//! │  └─ magic: "GEND"                            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Recording
//!
//! ```ignore
//! use gemba_core::recording::{Recorder, RecorderConfig};
//!
//! let mut recorder = Recorder::new("session.grec", RecorderConfig::from_core(&core));
//! recorder.start()?;
//!
//! // Once per emulated frame:
//! core.run_frame()?;
//! recorder.capture_core(&mut core)?;
//!
//! let report = recorder.stop();
//! ```
//!
//! # Decoding
//!
//! ```ignore
//! use gemba_core::recording::{DecodeOptions, decode, stats};
//!
//! println!("{} frames", stats(path)?.frame_count);
//! decode(path, Path::new("session.mp4"), &DecodeOptions::default(), None)?;
//! ```

mod decoder;
mod encoder;
mod format;
mod recorder;
mod writer;

pub use decoder::{DecodeError, DecodeSummary, RecordingStats, decode, decode_frames, stats};
pub use encoder::{
    DEFAULT_ENCODER, DecodeOptions, FfmpegEncoder, FrameSink, RawFrameSink, encoder_args,
    locate_encoder,
};
pub use format::{
    ContainerHeader, ContainerReader, END_MAGIC, FOOTER_SIZE, FORMAT_VERSION, FormatError,
    FrameRecord, HEADER_SIZE, MAGIC, RecordMeta, write_footer, write_record,
};
pub use recorder::{RecordError, Recorder, RecorderConfig, RecorderState, RecordingReport};
pub use writer::WriterReport;
