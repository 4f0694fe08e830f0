//! Container (.grec) wire format
//!
//! Header, frame record and footer encoding plus a streaming record reader.
//! All integers are little-endian.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::console::{BYTES_PER_PIXEL, FrameRate};

/// File magic at offset 0
pub const MAGIC: [u8; 8] = *b"GEMBAREC";
/// Trailing magic of the footer
pub const END_MAGIC: [u8; 4] = *b"GEND";
/// Current container version
pub const FORMAT_VERSION: u8 = 1;

pub const HEADER_SIZE: u64 = 32;
pub const FOOTER_SIZE: u64 = 8;

/// change_pct (1) + video_len (4) + audio_len (4)
const RECORD_OVERHEAD: u64 = 9;

/// Length prefixes above this are treated as corruption, not allocated.
const MAX_PAYLOAD_LEN: u64 = 256 << 20;

/// Container format errors
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Not a .grec recording (bad magic)")]
    BadMagic,

    #[error("Unsupported .grec version: {0}")]
    UnsupportedVersion(u8),

    #[error("Recording is shorter than its {HEADER_SIZE}-byte header")]
    TruncatedHeader,

    #[error("Frame size {width}x{height} does not fit the container header")]
    DimensionsTooLarge { width: u32, height: u32 },
}

/// The fixed 32-byte header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub width: u16,
    pub height: u16,
    pub frame_rate: FrameRate,
    pub audio_rate: u32,
    pub audio_channels: u8,
    pub audio_bits: u8,
}

impl ContainerHeader {
    pub fn new(
        width: u32,
        height: u32,
        frame_rate: FrameRate,
        audio_rate: u32,
        audio_channels: u8,
        audio_bits: u8,
    ) -> Result<Self, FormatError> {
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(FormatError::DimensionsTooLarge { width, height });
        };
        Ok(Self {
            version: FORMAT_VERSION,
            width: w,
            height: h,
            frame_rate,
            audio_rate,
            audio_channels,
            audio_bits,
        })
    }

    /// Size in bytes of one raw video frame
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u8(self.version)?;
        writer.write_u16::<LittleEndian>(self.width)?;
        writer.write_u16::<LittleEndian>(self.height)?;
        writer.write_u32::<LittleEndian>(self.frame_rate.num)?;
        writer.write_u32::<LittleEndian>(self.frame_rate.den)?;
        writer.write_u32::<LittleEndian>(self.audio_rate)?;
        writer.write_u8(self.audio_channels)?;
        writer.write_u8(self.audio_bits)?;
        writer.write_all(&[0u8; 5])?; // reserved
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let mut raw = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => FormatError::TruncatedHeader,
            _ => FormatError::Io(e),
        })?;

        if raw[..8] != MAGIC {
            return Err(FormatError::BadMagic);
        }

        let mut cursor = &raw[8..];
        let version = cursor.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let width = cursor.read_u16::<LittleEndian>()?;
        let height = cursor.read_u16::<LittleEndian>()?;
        let num = cursor.read_u32::<LittleEndian>()?;
        let den = cursor.read_u32::<LittleEndian>()?;
        let audio_rate = cursor.read_u32::<LittleEndian>()?;
        let audio_channels = cursor.read_u8()?;
        let audio_bits = cursor.read_u8()?;

        Ok(Self {
            version,
            width,
            height,
            frame_rate: FrameRate::new(num, den),
            audio_rate,
            audio_channels,
            audio_bits,
        })
    }
}

/// Write one frame record: change_pct, compressed video delta, raw audio.
pub fn write_record<W: Write>(
    writer: &mut W,
    change_pct: u8,
    video: &[u8],
    audio: &[u8],
) -> io::Result<()> {
    writer.write_u8(change_pct)?;
    writer.write_u32::<LittleEndian>(payload_len(video.len())?)?;
    writer.write_all(video)?;
    writer.write_u32::<LittleEndian>(payload_len(audio.len())?)?;
    writer.write_all(audio)?;
    Ok(())
}

/// Write the 8-byte footer.
pub fn write_footer<W: Write>(writer: &mut W, frame_count: u32) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(frame_count)?;
    writer.write_all(&END_MAGIC)
}

fn payload_len(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("record payload of {len} bytes exceeds u32"),
        )
    })
}

/// A fully read frame record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub change_pct: u8,
    /// Compressed video delta
    pub video: Vec<u8>,
    /// Raw audio samples
    pub audio: Vec<u8>,
}

/// A frame record read without its video payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub change_pct: u8,
    /// Length of the skipped compressed video delta
    pub video_len: u64,
    pub audio: Vec<u8>,
}

/// Streaming reader over a container's frame records.
///
/// Only one record is held in memory at a time. Iteration ends at the
/// footer, at end of input, or at the first incomplete record; a killed
/// recorder therefore still yields every complete frame it wrote.
pub struct ContainerReader<R: Read> {
    reader: R,
    header: ContainerHeader,
    len: u64,
    pos: u64,
    done: bool,
    records_read: u64,
    footer_frame_count: Option<u32>,
}

impl ContainerReader<BufReader<File>> {
    /// Open a recording file.
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Self::new(BufReader::new(file), len)
    }
}

impl<R: Read> ContainerReader<R> {
    /// Wrap a reader positioned at the start of a container of `len` bytes.
    pub fn new(mut reader: R, len: u64) -> Result<Self, FormatError> {
        if len < HEADER_SIZE {
            return Err(FormatError::TruncatedHeader);
        }
        let header = ContainerHeader::read_from(&mut reader)?;
        Ok(Self {
            reader,
            header,
            len,
            pos: HEADER_SIZE,
            done: false,
            records_read: 0,
            footer_frame_count: None,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Frame count stored in the footer. Advisory only; `None` until the
    /// footer has been reached, or when the file has no footer.
    pub fn footer_frame_count(&self) -> Option<u32> {
        self.footer_frame_count
    }

    /// Number of complete records returned so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read the next record including its video payload.
    pub fn next_record(&mut self) -> Result<Option<FrameRecord>, FormatError> {
        let Some((change_pct, video_len)) = self.begin_record()? else {
            return Ok(None);
        };
        let mut video = vec![0u8; video_len as usize];
        self.reader.read_exact(&mut video)?;
        self.pos += video_len;

        let Some(audio) = self.finish_record()? else {
            return Ok(None);
        };
        Ok(Some(FrameRecord {
            change_pct,
            video,
            audio,
        }))
    }

    /// Read the next record, skipping over its video payload.
    pub fn next_record_meta(&mut self) -> Result<Option<RecordMeta>, FormatError> {
        let Some((change_pct, video_len)) = self.begin_record()? else {
            return Ok(None);
        };
        let skipped = io::copy(&mut (&mut self.reader).take(video_len), &mut io::sink())?;
        if skipped != video_len {
            return Ok(self.truncated("video payload"));
        }
        self.pos += video_len;

        let Some(audio) = self.finish_record()? else {
            return Ok(None);
        };
        Ok(Some(RecordMeta {
            change_pct,
            video_len,
            audio,
        }))
    }

    /// Reads change_pct and video_len, or detects footer / end / truncation.
    fn begin_record(&mut self) -> Result<Option<(u8, u64)>, FormatError> {
        if self.done {
            return Ok(None);
        }

        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 {
            self.done = true;
            return Ok(None);
        }

        // A record is at least 9 bytes, so an 8-byte tail can only be the footer
        if remaining == FOOTER_SIZE {
            let frame_count = self.reader.read_u32::<LittleEndian>()?;
            let mut magic = [0u8; 4];
            self.reader.read_exact(&mut magic)?;
            self.pos += FOOTER_SIZE;
            self.done = true;
            if magic == END_MAGIC {
                self.footer_frame_count = Some(frame_count);
            } else {
                tracing::debug!("Recording tail is not a footer, ignoring 8 trailing bytes");
            }
            return Ok(None);
        }

        if remaining < RECORD_OVERHEAD {
            return Ok(self.truncated("record header"));
        }

        let change_pct = self.reader.read_u8()?;
        let video_len = self.reader.read_u32::<LittleEndian>()? as u64;
        self.pos += 5;

        if video_len > MAX_PAYLOAD_LEN || video_len + 4 > self.len - self.pos {
            return Ok(self.truncated("video payload"));
        }

        Ok(Some((change_pct, video_len)))
    }

    /// Reads audio_len and the audio payload, completing the record.
    fn finish_record(&mut self) -> Result<Option<Vec<u8>>, FormatError> {
        let audio_len = self.reader.read_u32::<LittleEndian>()? as u64;
        self.pos += 4;

        if audio_len > MAX_PAYLOAD_LEN || audio_len > self.len - self.pos {
            return Ok(self.truncated("audio payload"));
        }

        let mut audio = vec![0u8; audio_len as usize];
        self.reader.read_exact(&mut audio)?;
        self.pos += audio_len;
        self.records_read += 1;
        Ok(Some(audio))
    }

    fn truncated<T>(&mut self, what: &str) -> Option<T> {
        tracing::debug!(
            "Recording truncated in {} after {} complete frames",
            what,
            self.records_read
        );
        self.done = true;
        None
    }
}
