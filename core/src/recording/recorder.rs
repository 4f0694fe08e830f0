//! Container recorder
//!
//! Captures video frames and audio on the emulation thread and streams them
//! to a `.grec` file through the background writer.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::RecordingSettings;
use crate::console::{EmulatorCore, FrameRate};
use crate::delta::{DeltaError, change_percent, xor_delta};

use super::format::{ContainerHeader, FormatError, write_footer};
use super::writer::{PendingFrame, WriterHandle, WriterMessage};

/// Recorder errors
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Recorder already stopped; create a new recorder to record again")]
    Finished,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Frame does not match the recording size: {0}")]
    Delta(#[from] DeltaError),
}

/// Recording parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub audio_rate: u32,
    pub audio_channels: u8,
    pub audio_bits: u8,
    /// zlib level, 1 (fastest) to 9 (smallest)
    pub compression_level: u32,
    /// Frames per hand-off to the writer thread
    pub batch_size: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            width: 240,
            height: 160,
            frame_rate: FrameRate::GBA,
            audio_rate: 44_100,
            audio_channels: 2,
            audio_bits: 16,
            compression_level: 1,
            batch_size: 60, // ~1 second at 60fps
        }
    }
}

impl RecorderConfig {
    /// Take video and audio parameters from a loaded core.
    pub fn from_core<C: EmulatorCore + ?Sized>(core: &C) -> Self {
        Self {
            width: core.width(),
            height: core.height(),
            frame_rate: core.frame_rate(),
            audio_rate: core.audio_sample_rate(),
            audio_channels: core.audio_channels(),
            audio_bits: core.audio_bits(),
            ..Default::default()
        }
    }

    /// Apply user settings (compression level, batch size).
    pub fn with_settings(mut self, settings: &RecordingSettings) -> Self {
        self.compression_level = settings.compression_level;
        self.batch_size = settings.batch_size;
        self
    }

    fn effective_level(&self) -> u32 {
        self.compression_level.clamp(1, 9)
    }

    fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Recorder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    /// Terminal
    Stopped,
}

/// Outcome of a finished recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingReport {
    /// Frames captured (and declared in the footer)
    pub frame_count: u64,
    pub bytes_written: u64,
    /// The writer hit an I/O error; the file holds a prefix of the session
    pub write_failed: bool,
}

/// `.grec` recorder
pub struct Recorder {
    path: PathBuf,
    config: RecorderConfig,
    state: RecorderState,
    /// Last captured frame, zeroed at start
    previous_video: Vec<u8>,
    batch: Vec<PendingFrame>,
    frame_count: u64,
    writer: Option<WriterHandle>,
    report: RecordingReport,
}

impl Recorder {
    /// Create an idle recorder targeting `path`
    pub fn new(path: impl Into<PathBuf>, config: RecorderConfig) -> Self {
        Self {
            path: path.into(),
            config,
            state: RecorderState::Idle,
            previous_video: Vec::new(),
            batch: Vec::new(),
            frame_count: 0,
            writer: None,
            report: RecordingReport::default(),
        }
    }

    /// Create the file, start the writer thread and queue the header.
    pub fn start(&mut self) -> Result<(), RecordError> {
        match self.state {
            RecorderState::Recording => return Err(RecordError::AlreadyRecording),
            RecorderState::Stopped => return Err(RecordError::Finished),
            RecorderState::Idle => {}
        }

        let header = ContainerHeader::new(
            self.config.width,
            self.config.height,
            self.config.frame_rate,
            self.config.audio_rate,
            self.config.audio_channels,
            self.config.audio_bits,
        )?;

        let file = File::create(&self.path)?;
        let writer = WriterHandle::spawn(file, self.config.effective_level())?;
        writer.send(WriterMessage::Bytes(header.to_bytes()));

        self.previous_video = vec![0u8; header.frame_size()];
        self.batch = Vec::with_capacity(self.config.effective_batch_size());
        self.frame_count = 0;
        self.writer = Some(writer);
        self.state = RecorderState::Recording;

        tracing::info!(
            "Recording started: {} ({}x{} @ {} fps)",
            self.path.display(),
            self.config.width,
            self.config.height,
            self.config.frame_rate
        );
        Ok(())
    }

    /// Capture one frame of video plus the audio produced with it.
    ///
    /// Does nothing unless recording. A frame of the wrong size is rejected
    /// and leaves the recording untouched.
    pub fn capture(&mut self, video: &[u8], audio: &[u8]) -> Result<(), RecordError> {
        if self.state != RecorderState::Recording {
            return Ok(());
        }

        let delta = xor_delta(video, &self.previous_video)?;
        self.previous_video.copy_from_slice(video);

        self.batch.push(PendingFrame {
            change_pct: change_percent(&delta),
            delta,
            audio: audio.to_vec(),
        });
        self.frame_count += 1;

        if self.batch.len() >= self.config.effective_batch_size() {
            self.flush_batch();
        }
        Ok(())
    }

    /// Capture the core's current video buffer and drain its audio.
    pub fn capture_core<C: EmulatorCore + ?Sized>(
        &mut self,
        core: &mut C,
    ) -> Result<(), RecordError> {
        if self.state != RecorderState::Recording {
            return Ok(());
        }
        let audio = core.audio_buffer();
        self.capture(core.video_buffer(), &audio)
    }

    /// Flush the partial batch, write the footer and wait for the writer
    /// thread to close the file. Calling it again returns the same report.
    pub fn stop(&mut self) -> RecordingReport {
        if self.state != RecorderState::Recording {
            return self.report;
        }

        self.flush_batch();

        if let Some(writer) = self.writer.take() {
            let mut footer = Vec::with_capacity(8);
            let declared = u32::try_from(self.frame_count).unwrap_or(u32::MAX);
            if write_footer(&mut footer, declared).is_ok() {
                writer.send(WriterMessage::Bytes(footer));
            }

            let written = writer.finish();
            self.report = RecordingReport {
                frame_count: self.frame_count,
                bytes_written: written.bytes_written,
                write_failed: written.failed,
            };
        }

        self.previous_video = Vec::new();
        self.state = RecorderState::Stopped;

        if self.report.write_failed {
            tracing::warn!(
                "Recording stopped with write errors: {} ({} frames captured)",
                self.path.display(),
                self.frame_count
            );
        } else {
            tracing::info!(
                "Recording stopped: {} ({} frames, {} bytes)",
                self.path.display(),
                self.frame_count,
                self.report.bytes_written
            );
        }
        self.report
    }

    fn flush_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let frames = std::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.config.effective_batch_size()),
        );
        let count = frames.len();
        let sent = self
            .writer
            .as_ref()
            .is_some_and(|w| w.send(WriterMessage::Frames(frames)));
        if sent {
            tracing::debug!("Queued batch of {} frames", count);
        } else {
            tracing::warn!("Recording writer has exited; dropped {} frames", count);
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Frames captured since start
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.state == RecorderState::Recording {
            self.stop();
        }
    }
}
