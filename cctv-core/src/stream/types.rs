//! Shared types for the capture → transport → render pipeline.

use std::fmt;
use std::time::Instant;

use bytes::Bytes;

// ── SampledFrame ─────────────────────────────────────────────────

/// One encoded sample of the video source, ready for the wire.
///
/// Frames are fire-and-forget: they carry no identifier and are not
/// retained once handed to the transport.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// JPEG-compressed pixels.
    pub data: Bytes,
    /// Intrinsic width of the source at sampling time.
    pub width: u32,
    /// Intrinsic height of the source at sampling time.
    pub height: u32,
    /// When the snapshot was taken.
    pub captured_at: Instant,
}

// ── StreamingSession ─────────────────────────────────────────────

/// Whether the controller is currently sampling and sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamingSession {
    #[default]
    Idle,
    Active,
}

impl fmt::Display for StreamingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
        }
    }
}

// ── ConnectionState ──────────────────────────────────────────────

/// Lifecycle of the backend socket.
///
/// ```text
///  Connecting ──► Open ──► Closed
///       │                    ▲
///       └────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }

    /// Returns `true` when sends can reach the network.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ── SendOutcome ──────────────────────────────────────────────────

/// Result of handing a payload to the transport.
///
/// `Refused` is an ordinary value, not an error: the connection was not
/// open (or the writer was still busy) and the payload was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Refused,
}

// ── StreamStats ──────────────────────────────────────────────────

/// Counters published by the streaming controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Sampling ticks that fired while active.
    pub ticks: u64,
    /// Ticks skipped because the source had nothing to show.
    pub skipped_not_ready: u64,
    /// Ticks skipped because the previous encode was still running.
    pub skipped_busy: u64,
    /// Frames accepted by the transport.
    pub frames_sent: u64,
    /// Frames dropped because the transport refused them.
    pub frames_refused: u64,
    /// Compressed bytes accepted by the transport.
    pub bytes_sent: u64,
    /// Inbound frames published to the render state.
    pub frames_received: u64,
    /// Inbound bytes.
    pub bytes_received: u64,
}
