//! Shared test utilities for integration and unit tests

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::console::{BYTES_PER_PIXEL, EmulatorCore, keys};

pub const TEST_WIDTH: u32 = 240;
pub const TEST_HEIGHT: u32 = 160;
pub const TEST_CHECKSUM: u32 = 0xDEAD_BEEF;

/// Stereo s16 samples produced per frame
const SAMPLES_PER_FRAME: usize = 16;
const STATE_SIZE: usize = 20;
const SPRITE_SIZE: i32 = 8;

/// Emulated machine state; everything a save state holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct MachineState {
    frame: u32,
    x: i32,
    y: i32,
    score: u32,
    rng: u32,
}

/// Deterministic stand-in for a GBA core.
///
/// Keys move a sprite, bump a score and stir an RNG; the picture is a pure
/// function of the machine state, so replays are byte-identical.
pub struct FakeCore {
    state: MachineState,
    keys: u32,
    checksum: u32,
    video: Vec<u8>,
    audio: Vec<u8>,
    frames_run: u64,
    fail_saves: bool,
}

impl FakeCore {
    pub fn new() -> Self {
        Self::with_checksum(TEST_CHECKSUM)
    }

    /// A core with a different "ROM"
    pub fn with_checksum(checksum: u32) -> Self {
        let mut core = Self {
            state: MachineState {
                rng: 0x1234_5678,
                ..Default::default()
            },
            keys: 0,
            checksum,
            video: vec![0; (TEST_WIDTH * TEST_HEIGHT) as usize * BYTES_PER_PIXEL],
            audio: Vec::new(),
            frames_run: 0,
            fail_saves: false,
        };
        core.render();
        core
    }

    /// Frames emulated since construction (not part of save states)
    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Make `save_state_to_file` fail without touching the disk
    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    fn render(&mut self) {
        let s = self.state;
        let background = [
            (s.frame % 64) as u8,
            (s.score % 256) as u8,
            (s.rng >> 24) as u8,
            0xFF,
        ];
        let sprite_x = s.x.rem_euclid(TEST_WIDTH as i32);
        let sprite_y = s.y.rem_euclid(TEST_HEIGHT as i32);

        for (index, pixel) in self.video.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let px = (index as u32 % TEST_WIDTH) as i32;
            let py = (index as u32 / TEST_WIDTH) as i32;
            let in_sprite = (px - sprite_x).rem_euclid(TEST_WIDTH as i32) < SPRITE_SIZE
                && (py - sprite_y).rem_euclid(TEST_HEIGHT as i32) < SPRITE_SIZE;
            if in_sprite {
                pixel.copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
            } else {
                pixel.copy_from_slice(&background);
            }
        }
    }

    fn encode_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STATE_SIZE);
        for value in [
            self.state.frame,
            self.state.x as u32,
            self.state.y as u32,
            self.state.score,
            self.state.rng,
        ] {
            // Writing into a Vec cannot fail
            let _ = out.write_u32::<LittleEndian>(value);
        }
        out
    }
}

impl Default for FakeCore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatorCore for FakeCore {
    fn width(&self) -> u32 {
        TEST_WIDTH
    }

    fn height(&self) -> u32 {
        TEST_HEIGHT
    }

    fn run_frame(&mut self) -> Result<()> {
        let keys = self.keys;
        let s = &mut self.state;
        s.frame = s.frame.wrapping_add(1);
        if keys & keys::UP != 0 {
            s.y -= 1;
        }
        if keys & keys::DOWN != 0 {
            s.y += 1;
        }
        if keys & keys::LEFT != 0 {
            s.x -= 1;
        }
        if keys & keys::RIGHT != 0 {
            s.x += 1;
        }
        if keys & keys::A != 0 {
            s.score = s.score.wrapping_add(1);
        }
        if keys & keys::B != 0 {
            s.score = s.score.wrapping_mul(3);
        }
        // xorshift32, perturbed by input
        s.rng ^= keys;
        s.rng ^= s.rng << 13;
        s.rng ^= s.rng >> 17;
        s.rng ^= s.rng << 5;

        let tone = (self.state.frame % 100) as i16 * 100;
        for i in 0..SAMPLES_PER_FRAME {
            let sample = if i % 2 == 0 { tone } else { -tone };
            self.audio.extend_from_slice(&sample.to_le_bytes());
        }

        self.render();
        self.frames_run += 1;
        Ok(())
    }

    fn video_buffer(&self) -> &[u8] {
        &self.video
    }

    fn audio_buffer(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.audio)
    }

    fn checksum(&self) -> u32 {
        self.checksum
    }

    fn game_code(&self) -> String {
        "TEST".to_string()
    }

    fn set_keys(&mut self, mask: u32) {
        self.keys = mask & keys::ALL;
    }

    fn save_state_to_file(&mut self, path: &Path) -> Result<()> {
        if self.fail_saves {
            bail!("save states disabled");
        }
        std::fs::write(path, self.encode_state())
            .with_context(|| format!("writing save state {}", path.display()))
    }

    fn load_state_from_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading save state {}", path.display()))?;
        if bytes.len() != STATE_SIZE {
            bail!("save state is {} bytes, expected {}", bytes.len(), STATE_SIZE);
        }
        let mut cursor = Cursor::new(bytes);
        self.state = MachineState {
            frame: cursor.read_u32::<LittleEndian>()?,
            x: cursor.read_u32::<LittleEndian>()? as i32,
            y: cursor.read_u32::<LittleEndian>()? as i32,
            score: cursor.read_u32::<LittleEndian>()?,
            rng: cursor.read_u32::<LittleEndian>()?,
        };
        self.audio.clear();
        self.render();
        Ok(())
    }
}

/// Run `frames` frames holding `mask`.
pub fn run_frames(core: &mut FakeCore, mask: u32, frames: usize) {
    core.set_keys(mask);
    for _ in 0..frames {
        core.run_frame().unwrap();
    }
}

/// Write an executable `sh` script standing in for the video encoder.
#[cfg(unix)]
fn write_encoder_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Encoder that copies the raw video from stdin into its output argument.
///
/// It also leaves its argument list in `dir/args.txt` and a copy of the audio
/// input in `dir/audio.raw`.
#[cfg(unix)]
pub fn copying_encoder(dir: &Path) -> std::path::PathBuf {
    let body = format!(
        r#"printf '%s\n' "$@" > "{dir}/args.txt"
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ] && [ "$arg" != "-" ]; then
    cp "$arg" "{dir}/audio.raw"
  fi
  prev="$arg"
  last="$arg"
done
cat > "$last"
"#,
        dir = dir.display()
    );
    write_encoder_script(dir, "copy-encoder", &body)
}

/// Encoder that exits with status 3 without reading its input.
#[cfg(unix)]
pub fn failing_encoder(dir: &Path) -> std::path::PathBuf {
    write_encoder_script(dir, "failing-encoder", "exit 3\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_core_is_deterministic() {
        let mut a = FakeCore::new();
        let mut b = FakeCore::new();
        for mask in [keys::START, keys::UP | keys::A, 0, keys::DOWN | keys::B] {
            run_frames(&mut a, mask, 5);
            run_frames(&mut b, mask, 5);
        }
        assert_eq!(a.video_buffer(), b.video_buffer());
        assert_eq!(a.audio_buffer(), b.audio_buffer());
    }

    #[test]
    fn test_save_state_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.state");

        let mut core = FakeCore::new();
        run_frames(&mut core, keys::RIGHT | keys::A, 12);
        core.save_state_to_file(&path).unwrap();
        let saved = core.video_buffer().to_vec();

        run_frames(&mut core, keys::DOWN, 7);
        assert_ne!(core.video_buffer(), saved.as_slice());

        core.load_state_from_file(&path).unwrap();
        assert_eq!(core.video_buffer(), saved.as_slice());
    }

    #[test]
    fn test_keys_change_picture() {
        let mut a = FakeCore::new();
        let mut b = FakeCore::new();
        run_frames(&mut a, keys::RIGHT, 3);
        run_frames(&mut b, 0, 3);
        assert_ne!(a.video_buffer(), b.video_buffer());
    }
}
