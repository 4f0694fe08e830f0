//! Container decoder
//!
//! Streams a `.grec` back out without ever holding more than one frame in
//! memory. The frame count is always taken from the records themselves,
//! never from the footer, so a recording cut short by a crash decodes as
//! the prefix that made it to disk.

use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use serde::Serialize;

use crate::delta::{DeltaError, xor_in_place};

use super::encoder::{DecodeOptions, FfmpegEncoder, FrameSink, locate_encoder};
use super::format::{ContainerHeader, ContainerReader, FormatError};

/// Decoder errors
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Frame {frame} delta does not match the frame size: {source}")]
    Delta { frame: u64, source: DeltaError },

    #[error("Failed to inflate frame {frame}: {source}")]
    Inflate { frame: u64, source: io::Error },

    #[error("Video encoder not found: {0}")]
    EncoderNotFound(String),

    #[error("Video encoder failed: {0}")]
    EncoderFailed(String),

    #[error("Recording contains no frames")]
    NoFrames,
}

/// Summary statistics, computed without decompressing any video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingStats {
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
    pub avg_change_pct: f64,
    /// Size of every frame uncompressed
    pub raw_video_size: u64,
    pub compressed_video_size: u64,
    pub audio_size: u64,
    pub audio_rate: u32,
    pub audio_channels: u8,
    /// Advisory count from the footer, if one was found
    pub footer_frame_count: Option<u32>,
}

/// Result of a successful decode
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeSummary {
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub avg_change_pct: f64,
    pub output_path: PathBuf,
}

/// Totals gathered by one pass over the records
struct Scan {
    header: ContainerHeader,
    frame_count: u64,
    change_pct_sum: u64,
    compressed_video_size: u64,
    audio_size: u64,
    footer_frame_count: Option<u32>,
}

impl Scan {
    fn avg_change_pct(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        self.change_pct_sum as f64 / self.frame_count as f64
    }
}

/// Walk every record without inflating video, optionally copying audio out.
fn scan(path: &Path, mut audio_out: Option<&mut dyn Write>) -> Result<Scan, DecodeError> {
    let mut reader = ContainerReader::open(path)?;
    let mut totals = Scan {
        header: *reader.header(),
        frame_count: 0,
        change_pct_sum: 0,
        compressed_video_size: 0,
        audio_size: 0,
        footer_frame_count: None,
    };

    while let Some(meta) = reader.next_record_meta()? {
        totals.frame_count += 1;
        totals.change_pct_sum += meta.change_pct as u64;
        totals.compressed_video_size += meta.video_len;
        totals.audio_size += meta.audio.len() as u64;
        if let Some(out) = audio_out.as_mut() {
            out.write_all(&meta.audio)?;
        }
    }
    totals.footer_frame_count = reader.footer_frame_count();

    if let Some(declared) = totals.footer_frame_count
        && declared as u64 != totals.frame_count
    {
        tracing::debug!(
            "Footer declares {} frames, found {}",
            declared,
            totals.frame_count
        );
    }
    Ok(totals)
}

/// Read recording statistics.
pub fn stats(path: &Path) -> Result<RecordingStats, DecodeError> {
    let scan = scan(path, None)?;
    let header = scan.header;
    let fps = header.frame_rate.as_f64();
    let duration_secs = if fps > 0.0 {
        scan.frame_count as f64 / fps
    } else {
        0.0
    };

    Ok(RecordingStats {
        frame_count: scan.frame_count,
        width: header.width as u32,
        height: header.height as u32,
        fps,
        duration_secs,
        avg_change_pct: scan.avg_change_pct(),
        raw_video_size: scan.frame_count * header.frame_size() as u64,
        compressed_video_size: scan.compressed_video_size,
        audio_size: scan.audio_size,
        audio_rate: header.audio_rate,
        audio_channels: header.audio_channels,
        footer_frame_count: scan.footer_frame_count,
    })
}

/// Rebuilds raw frames from successive XOR deltas.
struct FrameReconstructor {
    frame: Vec<u8>,
    delta: Vec<u8>,
}

impl FrameReconstructor {
    fn new(frame_size: usize) -> Self {
        Self {
            frame: vec![0u8; frame_size],
            delta: Vec::with_capacity(frame_size),
        }
    }

    fn apply(&mut self, index: u64, compressed: &[u8]) -> Result<&[u8], DecodeError> {
        self.delta.clear();
        // Never inflate more than one byte past a frame
        let limit = self.frame.len() as u64 + 1;
        ZlibDecoder::new(compressed)
            .take(limit)
            .read_to_end(&mut self.delta)
            .map_err(|source| DecodeError::Inflate {
                frame: index,
                source,
            })?;
        xor_in_place(&mut self.frame, &self.delta).map_err(|source| DecodeError::Delta {
            frame: index,
            source,
        })?;
        Ok(&self.frame)
    }
}

/// Second pass: reconstruct every frame and hand it to `sink`.
fn stream_frames(
    path: &Path,
    total: u64,
    sink: &mut dyn FrameSink,
    mut progress: Option<&mut dyn FnMut(f64)>,
) -> Result<u64, DecodeError> {
    let mut reader = ContainerReader::open(path)?;
    let mut frames = FrameReconstructor::new(reader.header().frame_size());
    let mut index = 0u64;

    while let Some(record) = reader.next_record()? {
        let frame = frames.apply(index, &record.video)?;
        sink.write_frame(frame)?;
        index += 1;

        if let Some(report) = progress.as_deref_mut() {
            report((index as f64 / total.max(index) as f64).min(1.0));
        }
    }
    Ok(index)
}

/// Reconstruct every frame of a recording into `sink`.
///
/// Returns the number of frames written.
pub fn decode_frames(
    path: &Path,
    sink: &mut dyn FrameSink,
    progress: Option<&mut dyn FnMut(f64)>,
) -> Result<u64, DecodeError> {
    // Progress needs a total up front
    let total = match progress {
        Some(_) => scan(path, None)?.frame_count,
        None => 0,
    };
    stream_frames(path, total, sink, progress)
}

/// Decode a recording into a video file with the external encoder.
///
/// Pass 1 extracts audio and counts frames; pass 2 reconstructs video
/// frames and pipes them to the encoder. `progress` receives the completed
/// fraction after each frame of pass 2.
pub fn decode(
    path: &Path,
    output: &Path,
    options: &DecodeOptions,
    progress: Option<&mut dyn FnMut(f64)>,
) -> Result<DecodeSummary, DecodeError> {
    let encoder_path = locate_encoder(options)?;

    let mut audio_track = tempfile::Builder::new()
        .prefix("gemba-audio")
        .suffix(".raw")
        .tempfile()?;
    let scan = {
        let mut out = BufWriter::new(audio_track.as_file_mut());
        let scan = scan(path, Some(&mut out))?;
        out.flush()?;
        scan
    };
    if scan.frame_count == 0 {
        return Err(DecodeError::NoFrames);
    }

    let header = scan.header;
    let audio = (scan.audio_size > 0).then(|| audio_track.path());
    tracing::info!(
        "Decoding {} ({} frames, {}x{}) to {}",
        path.display(),
        scan.frame_count,
        header.width,
        header.height,
        output.display()
    );

    let mut encoder = FfmpegEncoder::spawn(&encoder_path, &header, audio, output, options)?;
    let frame_count = match stream_frames(path, scan.frame_count, &mut encoder, progress) {
        Ok(count) => count,
        Err(e) => {
            // A dead encoder surfaces as a broken pipe; report its exit instead
            return Err(match encoder.finish() {
                Err(encoder_error) => encoder_error,
                Ok(()) => e,
            });
        }
    };
    encoder.finish()?;

    Ok(DecodeSummary {
        frame_count,
        width: header.width as u32,
        height: header.height as u32,
        fps: header.frame_rate.as_f64(),
        avg_change_pct: scan.avg_change_pct(),
        output_path: output.to_path_buf(),
    })
}
