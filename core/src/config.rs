//! Capture settings (capture.toml)
//!
//! User-tunable knobs for recording, input logging and decoding. Stored as
//! TOML in the platform-specific config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recording::DecodeOptions;

/// All capture settings, one section per pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaptureSettings {
    /// Audio/video recording settings
    #[serde(default)]
    pub recording: RecordingSettings,
    /// Input log settings
    #[serde(default)]
    pub input: InputSettings,
    /// Decode/encoder settings
    #[serde(default)]
    pub decode: DecodeOptions,
}

/// `.grec` recorder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// zlib level for video deltas (default: 1, range: 1-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
    /// Frames per writer hand-off (default: 60)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// `.gir` input log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Flush the log to disk every N frames (default: 60, 0 = only on stop)
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,
}

fn default_compression_level() -> u32 {
    1
}
fn default_batch_size() -> usize {
    60
}
fn default_flush_interval() -> u64 {
    60
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
        }
    }
}

/// Settings file name inside [`config_dir`]
pub const SETTINGS_FILE: &str = "capture.toml";

/// Returns the platform-specific configuration directory.
///
/// On Linux: `~/.config/Gemba`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.gemba", "", "Gemba")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default settings path, if a config directory exists.
pub fn default_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(SETTINGS_FILE))
}

impl CaptureSettings {
    /// Load settings from `path`.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load from the default location, falling back to defaults on any problem.
    pub fn load_default() -> Self {
        let Some(path) = default_path() else {
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    /// Write settings as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
