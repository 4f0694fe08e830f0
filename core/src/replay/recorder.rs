//! Input log recorder
//!
//! Appends one key bitmask per emulated frame to a `.gir` file, anchored to a
//! save state taken when recording starts.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::InputSettings;
use crate::console::EmulatorCore;

use super::format::{InputLogHeader, anchor_path_for, frame_count_field};

/// Input recorder errors
#[derive(Debug, thiserror::Error)]
pub enum InputRecordError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Input recorder already stopped; create a new recorder to record again")]
    Finished,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Emulator core error: {0:#}")]
    Core(anyhow::Error),
}

/// Input recorder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecorderConfig {
    /// Flush to disk every N frames; 0 flushes only on stop
    pub flush_interval: u64,
}

impl Default for InputRecorderConfig {
    fn default() -> Self {
        Self { flush_interval: 60 }
    }
}

impl From<&InputSettings> for InputRecorderConfig {
    fn from(settings: &InputSettings) -> Self {
        Self {
            flush_interval: settings.flush_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Recording,
    Stopped,
}

/// `.gir` recorder
pub struct InputRecorder {
    path: PathBuf,
    anchor_path: PathBuf,
    config: InputRecorderConfig,
    state: State,
    writer: Option<BufWriter<File>>,
    /// Byte offset of the header's frame count digits
    count_offset: u64,
    frame_count: u64,
}

impl InputRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, InputRecorderConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: InputRecorderConfig) -> Self {
        let path = path.into();
        Self {
            anchor_path: anchor_path_for(&path),
            path,
            config,
            state: State::Idle,
            writer: None,
            count_offset: 0,
            frame_count: 0,
        }
    }

    /// Snapshot the core to the anchor state and write the log header.
    pub fn start<C: EmulatorCore + ?Sized>(
        &mut self,
        core: &mut C,
    ) -> Result<(), InputRecordError> {
        match self.state {
            State::Recording => return Err(InputRecordError::AlreadyRecording),
            State::Stopped => return Err(InputRecordError::Finished),
            State::Idle => {}
        }

        let file = File::create(&self.path)?;
        if let Err(e) = core.save_state_to_file(&self.anchor_path) {
            drop(file);
            // No anchor, no log
            let _ = std::fs::remove_file(&self.path);
            return Err(InputRecordError::Core(e));
        }

        let header = InputLogHeader {
            rom_checksum: core.checksum(),
            game_code: core.game_code(),
            anchor_state: self
                .anchor_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            rom_path: core
                .rom_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            frame_count: 0,
        };

        let mut writer = BufWriter::new(file);
        self.count_offset = header.write_to(&mut writer)?;
        writer.flush()?;

        self.writer = Some(writer);
        self.frame_count = 0;
        self.state = State::Recording;

        tracing::info!(
            "Input recording started: {} (anchor {})",
            self.path.display(),
            self.anchor_path.display()
        );
        Ok(())
    }

    /// Append the key bitmask for one emulated frame.
    ///
    /// Does nothing unless recording.
    pub fn capture(&mut self, mask: u32) -> Result<(), InputRecordError> {
        if self.state != State::Recording {
            return Ok(());
        }
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        writeln!(writer, "{mask:x}")?;
        self.frame_count += 1;

        let interval = self.config.flush_interval;
        if interval > 0 && self.frame_count % interval == 0 {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush, patch the header frame count and close the log.
    pub fn stop(&mut self) {
        if self.state != State::Recording {
            return;
        }
        self.state = State::Stopped;

        if let Some(writer) = self.writer.take()
            && let Err(e) = finalize(writer, self.count_offset, self.frame_count)
        {
            tracing::error!(
                "Failed to finalize input log {}: {}",
                self.path.display(),
                e
            );
        }

        tracing::info!(
            "Input recording stopped: {} ({} frames)",
            self.path.display(),
            self.frame_count
        );
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_recording(&self) -> bool {
        self.state == State::Recording
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save state written at start
    pub fn anchor_path(&self) -> &Path {
        &self.anchor_path
    }
}

fn finalize(writer: BufWriter<File>, offset: u64, frame_count: u64) -> io::Result<()> {
    let mut file = writer.into_inner().map_err(|e| e.into_error())?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(frame_count_field(frame_count).as_bytes())?;
    file.sync_all()
}

impl Drop for InputRecorder {
    fn drop(&mut self) {
        if self.state == State::Recording {
            self.stop();
        }
    }
}
