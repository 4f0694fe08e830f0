//! Input log (.gir) text format
//!
//! A `#`-commented `key: value` header closed by `---`, then one hex key
//! bitmask per emulated frame.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// First header line (after the `# `)
pub const BANNER: &str = "GEMBA INPUT RECORDING v1";
/// Ends the header block
pub const SEPARATOR: &str = "---";
/// Extension of the anchor save state written next to the log
pub const ANCHOR_EXTENSION: &str = "state";

/// Digits reserved for the frame count so it can be patched in place
const FRAME_COUNT_WIDTH: usize = 10;
const FRAME_COUNT_MAX: u64 = 9_999_999_999;

/// Header of an input log
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputLogHeader {
    pub rom_checksum: u32,
    pub game_code: String,
    /// File name of the anchor state, in the log's directory
    pub anchor_state: String,
    pub rom_path: String,
    /// Advisory; the body line count is authoritative
    pub frame_count: u64,
}

impl InputLogHeader {
    /// Write the header block including the separator.
    ///
    /// Returns the byte offset of the frame count digits.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        let mut text = format!("# {BANNER}\n");
        text.push_str(&format!("# rom_checksum: {}\n", self.rom_checksum));
        text.push_str(&format!("# game_code: {}\n", single_line(&self.game_code)));
        text.push_str(&format!(
            "# anchor_state: {}\n",
            single_line(&self.anchor_state)
        ));
        text.push_str(&format!("# rom_path: {}\n", single_line(&self.rom_path)));
        text.push_str("# frame_count: ");
        let offset = text.len() as u64;
        text.push_str(&frame_count_field(self.frame_count));
        text.push('\n');
        text.push_str(SEPARATOR);
        text.push('\n');

        writer.write_all(text.as_bytes())?;
        Ok(offset)
    }
}

/// Zero-padded, fixed-width frame count
pub fn frame_count_field(count: u64) -> String {
    format!(
        "{:0width$}",
        count.min(FRAME_COUNT_MAX),
        width = FRAME_COUNT_WIDTH
    )
}

/// Header values must stay on one line
fn single_line(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

/// Split `# key: value` into its parts.
pub fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let body = line.trim().strip_prefix('#')?;
    let (key, value) = body.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// True for the `# GEMBA INPUT RECORDING v1` line
pub fn is_banner(line: &str) -> bool {
    line.trim()
        .strip_prefix('#')
        .is_some_and(|rest| rest.trim() == BANNER)
}

/// Parse one body line as a hex bitmask.
pub fn parse_bitmask(line: &str) -> Option<u32> {
    let hex = line.trim();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if hex.is_empty() {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Anchor state path for an input log: same directory, `.state` extension.
pub fn anchor_path_for(log_path: &Path) -> PathBuf {
    log_path.with_extension(ANCHOR_EXTENSION)
}
