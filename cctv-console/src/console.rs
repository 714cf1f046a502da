//! Operator commands and the extracted-frames results view.
//!
//! Commands arrive one per line on stdin:
//!
//! ```text
//! play            start playback and streaming
//! pause           pause playback and stop streaming
//! query <text>    fetch extracted frames for <text>
//! status          print session, connection and counters
//! quit            shut down
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use cctv_core::{ConnectionState, StreamError, StreamStats, StreamingSession};

/// Number of placeholder tiles shown when a query returns nothing.
pub const PLACEHOLDER_TILES: usize = 3;

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
    Query(String),
    Status,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "play" => Command::Play,
            "pause" => Command::Pause,
            "query" | "search" => {
                if rest.is_empty() {
                    return Err("usage: query <text>".into());
                }
                Command::Query(rest.to_string())
            }
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command `{other}`")),
        };
        Ok(Some(cmd))
    }
}

/// One-line summary for the `status` command.
pub fn status_line(
    session: StreamingSession,
    connection: ConnectionState,
    stats: &StreamStats,
) -> String {
    format!(
        "session={session} connection={connection} ticks={} sent={} refused={} \
         busy={} not_ready={} received={} bytes_out={} bytes_in={}",
        stats.ticks,
        stats.frames_sent,
        stats.frames_refused,
        stats.skipped_busy,
        stats.skipped_not_ready,
        stats.frames_received,
        stats.bytes_sent,
        stats.bytes_received,
    )
}

// ── Results view ─────────────────────────────────────────────────

/// Write extracted frames to `dir` as `frame_<n>.jpg`, numbered from 1.
pub fn write_results(dir: &Path, snaps: &[Bytes]) -> Result<Vec<PathBuf>, StreamError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(snaps.len());
    for (i, snap) in snaps.iter().enumerate() {
        let path = dir.join(format!("frame_{}.jpg", i + 1));
        std::fs::write(&path, snap)?;
        debug!("wrote {}", path.display());
        written.push(path);
    }
    info!(dir = %dir.display(), count = written.len(), "extracted frames saved");
    Ok(written)
}

/// Text of the results view for `query`.
///
/// Lists the saved frames, or placeholder tiles when there are none.
pub fn render_report(query: &str, saved: &[PathBuf]) -> String {
    let mut out = format!("Analysis for: {query}\n");
    if saved.is_empty() {
        for n in 1..=PLACEHOLDER_TILES {
            let _ = writeln!(out, "  [Frame {n}]");
        }
    } else {
        for path in saved {
            let _ = writeln!(out, "  {}", path.display());
        }
    }
    out
}
