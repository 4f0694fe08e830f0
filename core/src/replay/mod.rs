//! Input recording and replay (.gir)
//!
//! An input log is a save state (the anchor) plus the key bitmask of every
//! frame emulated after it. Loading the anchor and feeding the bitmasks back
//! reproduces the session exactly on a deterministic core.
//!
//! # File Structure
//!
//! ```text
//! # GEMBA INPUT RECORDING v1
//! # rom_checksum: 3735928559
//! # game_code: AGBE
//! # anchor_state: session.state
//! # rom_path: /roms/game.gba
//! # frame_count: 0000000003
//! ---
//! 8
//! 48
//! 0
//! ```
//!
//! The header frame count is advisory. A log cut short by a crash still
//! replays every line that reached the disk.
//!
//! # Recording
//!
//! ```ignore
//! use gemba_core::replay::InputRecorder;
//!
//! let mut recorder = InputRecorder::new("session.gir");
//! recorder.start(&mut core)?; // writes session.state
//!
//! // Once per emulated frame:
//! core.set_keys(mask);
//! core.run_frame()?;
//! recorder.capture(mask)?;
//!
//! recorder.stop();
//! ```
//!
//! # Replaying
//!
//! ```ignore
//! use gemba_core::replay::InputReplayer;
//!
//! let mut replayer = InputReplayer::open(Path::new("session.gir"))?;
//! replayer.replay(&mut core)?;
//! ```

mod format;
mod recorder;
mod replayer;

pub use format::{
    ANCHOR_EXTENSION, BANNER, InputLogHeader, SEPARATOR, anchor_path_for, parse_header_line,
};
pub use recorder::{InputRecordError, InputRecorder, InputRecorderConfig};
pub use replayer::{InputReplayer, ReplayError};
