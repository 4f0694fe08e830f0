//! Background container writer
//!
//! Each open [`Recorder`](super::Recorder) owns exactly one writer thread.
//! The emulation thread hands it serialized chunks and batches of raw frame
//! deltas; the thread compresses, writes and finally closes the file. It is
//! the only code that touches the output file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::format::write_record;

/// A captured frame waiting for compression
#[derive(Debug, Clone)]
pub(crate) struct PendingFrame {
    pub change_pct: u8,
    /// Uncompressed XOR delta against the previous frame
    pub delta: Vec<u8>,
    pub audio: Vec<u8>,
}

pub(crate) enum WriterMessage {
    /// Pre-serialized bytes (header, footer)
    Bytes(Vec<u8>),
    /// Frames to compress and append as records
    Frames(Vec<PendingFrame>),
    /// Flush, close and exit
    Finish,
}

/// What the writer thread managed to do before it exited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub bytes_written: u64,
    pub frames_written: u64,
    /// A write or compression error stopped output early
    pub failed: bool,
}

/// Producer side of the writer thread
pub(crate) struct WriterHandle {
    sender: mpsc::Sender<WriterMessage>,
    thread: JoinHandle<WriterReport>,
}

impl WriterHandle {
    /// Spawn the writer thread for `file`.
    pub fn spawn(file: File, compression_level: u32) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("grec-writer".to_string())
            .spawn(move || run(file, compression_level, receiver))?;
        Ok(Self { sender, thread })
    }

    /// Queue a message. Never blocks. Returns false if the thread is gone.
    pub fn send(&self, message: WriterMessage) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Send the finish sentinel and wait for the thread to close the file.
    pub fn finish(self) -> WriterReport {
        let _ = self.sender.send(WriterMessage::Finish);
        match self.thread.join() {
            Ok(report) => report,
            Err(_) => {
                tracing::error!("Recording writer thread panicked");
                WriterReport {
                    failed: true,
                    ..Default::default()
                }
            }
        }
    }
}

fn run(file: File, compression_level: u32, receiver: mpsc::Receiver<WriterMessage>) -> WriterReport {
    let mut out = BufWriter::new(file);
    let mut report = WriterReport::default();
    let mut record = Vec::new();
    let level = Compression::new(compression_level);

    for message in receiver.iter() {
        let result = match message {
            WriterMessage::Finish => break,
            // Keep draining so the producer never sees a closed channel
            _ if report.failed => continue,
            WriterMessage::Bytes(bytes) => out
                .write_all(&bytes)
                .map(|()| report.bytes_written += bytes.len() as u64),
            WriterMessage::Frames(frames) => {
                write_frames(&mut out, &mut record, level, &frames, &mut report)
            }
        };

        if let Err(e) = result {
            tracing::error!(
                "Recording write failed after {} frames: {}",
                report.frames_written,
                e
            );
            report.failed = true;
        }
    }

    if !report.failed {
        let closed = out.flush().and_then(|()| out.get_ref().sync_all());
        if let Err(e) = closed {
            tracing::error!("Failed to finalize recording: {}", e);
            report.failed = true;
        }
    }

    report
}

fn write_frames<W: Write>(
    out: &mut W,
    record: &mut Vec<u8>,
    level: Compression,
    frames: &[PendingFrame],
    report: &mut WriterReport,
) -> io::Result<()> {
    for frame in frames {
        let video = compress(&frame.delta, level)?;

        // Serialize the whole record before writing so a failure never
        // leaves half a record behind a successful write_all
        record.clear();
        write_record(record, frame.change_pct, &video, &frame.audio)?;
        out.write_all(record)?;

        report.bytes_written += record.len() as u64;
        report.frames_written += 1;
    }
    tracing::debug!("Wrote batch of {} frames", frames.len());
    Ok(())
}

/// zlib-compress a frame delta.
pub(crate) fn compress(delta: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(delta.len() / 8), level);
    encoder.write_all(delta)?;
    encoder.finish()
}
