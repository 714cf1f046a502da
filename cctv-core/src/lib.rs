//! # cctv-core
//!
//! Core library for the CCTV console.
//!
//! This crate contains:
//! - **Stream**: the frame-streaming pipeline — `FrameSampler`,
//!   `TransportChannel`, `StreamingController` and the render state
//! - **Query**: `SnapshotClient` for the batch "extracted frames" request
//! - **Config**: `StreamConfig`, the pipeline's tunables
//! - **Error**: `StreamError` — typed, `thiserror`-based error hierarchy

pub mod config;
pub mod error;
pub mod query;
pub mod stream;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::StreamConfig;
pub use error::StreamError;
pub use query::SnapshotClient;
pub use stream::{
    ConnectionState, DisplayRegistry, FrameSampler, FrameSequence, FrameTransport, InboundFrame,
    RenderView, SendOutcome, StreamStats, StreamingController, StreamingSession,
    TransportChannel, TransportEvent, VideoSource,
};
