//! Console configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cctv_core::StreamConfig;
use cctv_core::query::DEFAULT_SNAPS_URL;

/// Top-level configuration for the console.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Streaming pipeline tunables.
    pub stream: StreamConfig,
    /// Local video to play.
    pub source: SourceConfig,
    /// Where the processed feed is shown.
    pub render: RenderConfig,
    /// Batch "extracted frames" query.
    pub query: QueryConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Local video settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory of still frames, played in file-name order.
    pub frames_dir: PathBuf,
    /// Playback rate of the frame sequence.
    pub fps: f64,
    /// Restart from the first frame after the last one.
    pub looping: bool,
}

/// Render sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// File the current processed frame is written to.
    pub output_path: PathBuf,
}

/// Batch query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Snapshot endpoint.
    pub snaps_url: String,
    /// Directory the extracted frames are written to.
    pub results_dir: PathBuf,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("footage"),
            fps: 10.0,
            looping: false,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("live.jpg"),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            snaps_url: DEFAULT_SNAPS_URL.into(),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ConsoleConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────
