//! Streaming configuration.
//!
//! These three knobs are the only tunables of the pipeline. They are
//! embedded in the console's TOML config under `[stream]`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Default backend socket address.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws/video";
/// Default sampling rate (ticks per second).
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 10.0;
/// Default JPEG quality on a 0..=1 scale.
pub const DEFAULT_ENCODE_QUALITY: f32 = 0.5;

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the streaming pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket endpoint of the analysis backend.
    pub endpoint: String,
    /// Sampling ticks per second while streaming is active.
    pub sample_rate_hz: f64,
    /// Encoder quality, 0.0 (smallest) to 1.0 (best).
    pub encode_quality: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            encode_quality: DEFAULT_ENCODE_QUALITY,
        }
    }
}

impl StreamConfig {
    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<(), StreamError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(StreamError::config(
                "endpoint",
                format!("expected a ws:// or wss:// address, got {:?}", self.endpoint),
            ));
        }
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(StreamError::config(
                "sample_rate_hz",
                format!("must be a positive number, got {}", self.sample_rate_hz),
            ));
        }
        if !(0.0..=1.0).contains(&self.encode_quality) {
            return Err(StreamError::config(
                "encode_quality",
                format!("must be within 0..=1, got {}", self.encode_quality),
            ));
        }
        Ok(())
    }

    /// Nominal period between sampling ticks, never shorter than 1 ms.
    ///
    /// An invalid rate falls back to the default.
    pub fn tick_interval(&self) -> Duration {
        let hz = if self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0 {
            self.sample_rate_hz
        } else {
            DEFAULT_SAMPLE_RATE_HZ
        };
        Duration::from_secs_f64(1.0 / hz).max(MIN_TICK_INTERVAL)
    }

    /// Quality mapped onto the JPEG encoder's 1..=100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.encode_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}
