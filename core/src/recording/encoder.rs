//! External video encoder
//!
//! Reconstructed frames are streamed as raw pixels into an `ffmpeg`
//! subprocess. Transcoding itself is entirely ffmpeg's business; this module
//! only builds the command line and owns the pipe.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use serde::{Deserialize, Serialize};

use super::decoder::DecodeError;
use super::format::ContainerHeader;

/// Encoder binary looked up on PATH when none is configured
pub const DEFAULT_ENCODER: &str = "ffmpeg";

/// Output encoding options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Explicit encoder binary (default: `ffmpeg` from PATH)
    #[serde(default)]
    pub encoder: Option<PathBuf>,
    /// Integer upscale factor, nearest-neighbour (default: 1)
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// Video codec passed to `-c:v` (default: libx264)
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    /// Audio codec passed to `-c:a` (default: aac)
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    /// Pixel layout of the recorded frames (default: rgba)
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    /// Appended verbatim before the output path
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_scale() -> u32 {
    1
}
fn default_video_codec() -> String {
    "libx264".to_string()
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_pixel_format() -> String {
    "rgba".to_string()
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            encoder: None,
            scale: default_scale(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            pixel_format: default_pixel_format(),
            extra_args: Vec::new(),
        }
    }
}

/// Receives reconstructed raw frames in order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Resolve the encoder binary, failing with `EncoderNotFound` if absent.
pub fn locate_encoder(options: &DecodeOptions) -> Result<PathBuf, DecodeError> {
    match &options.encoder {
        Some(path) if path.is_file() => Ok(path.clone()),
        // Bare program names still go through PATH
        Some(path) => which::which(path)
            .map_err(|_| DecodeError::EncoderNotFound(path.display().to_string())),
        None => which::which(DEFAULT_ENCODER)
            .map_err(|_| DecodeError::EncoderNotFound(DEFAULT_ENCODER.to_string())),
    }
}

/// ffmpeg sample format for a bit depth
fn sample_format(bits: u8) -> &'static str {
    match bits {
        8 => "u8",
        32 => "s32le",
        _ => "s16le",
    }
}

fn push_args(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

/// Build the ffmpeg argument list.
pub fn encoder_args(
    header: &ContainerHeader,
    audio: Option<&Path>,
    output: &Path,
    options: &DecodeOptions,
) -> Vec<OsString> {
    let mut args = Vec::new();
    push_args(&mut args, &["-y", "-loglevel", "error"]);

    // Video from stdin
    let size = format!("{}x{}", header.width, header.height);
    let rate = header.frame_rate.to_string();
    push_args(
        &mut args,
        &[
            "-f",
            "rawvideo",
            "-pix_fmt",
            &options.pixel_format,
            "-s",
            &size,
            "-r",
            &rate,
            "-i",
            "-",
        ],
    );

    if let Some(path) = audio {
        let sample_rate = header.audio_rate.to_string();
        let channels = header.audio_channels.to_string();
        push_args(
            &mut args,
            &[
                "-f",
                sample_format(header.audio_bits),
                "-ar",
                &sample_rate,
                "-ac",
                &channels,
                "-i",
            ],
        );
        args.push(path.as_os_str().to_owned());
    }

    if options.scale > 1 {
        let filter = format!("scale=iw*{0}:ih*{0}:flags=neighbor", options.scale);
        push_args(&mut args, &["-vf", &filter]);
    }
    push_args(
        &mut args,
        &["-c:v", &options.video_codec, "-pix_fmt", "yuv420p"],
    );

    if audio.is_some() {
        push_args(&mut args, &["-c:a", &options.audio_codec, "-shortest"]);
    }

    args.extend(options.extra_args.iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

/// Running ffmpeg process fed through stdin
pub struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegEncoder {
    pub fn spawn(
        binary: &Path,
        header: &ContainerHeader,
        audio: Option<&Path>,
        output: &Path,
        options: &DecodeOptions,
    ) -> Result<Self, DecodeError> {
        let mut child = Command::new(binary)
            .args(encoder_args(header, audio, output, options))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    DecodeError::EncoderNotFound(binary.display().to_string())
                }
                _ => DecodeError::Io(e),
            })?;

        let stdin = child.stdin.take();
        tracing::debug!("Spawned encoder {}", binary.display());
        Ok(Self {
            child: Some(child),
            stdin,
        })
    }

    /// Close stdin and wait for the encoder to exit.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if !status.success() {
            tracing::error!("Encoder failed: {}", status);
            return Err(DecodeError::EncoderFailed(status.to_string()));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(frame),
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Writes frames verbatim, e.g. into a `.rgba` dump
pub struct RawFrameSink<W: Write> {
    inner: W,
    frames: u64,
}

impl<W: Write> RawFrameSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> FrameSink for RawFrameSink<W> {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.inner.write_all(frame)?;
        self.frames += 1;
        Ok(())
    }
}

/// Collects every frame in memory, in order.
///
/// Holds the whole recording at once; meant for short clips and checks.
impl FrameSink for Vec<Vec<u8>> {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.push(frame.to_vec());
        Ok(())
    }
}
