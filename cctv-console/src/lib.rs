//! # cctv-console — CCTV operator console
//!
//! Plays a local frame sequence, streams sampled frames to the analysis
//! backend over WebSocket and writes the processed feed to a file.
//! Operator commands (`play`, `pause`, `query`, `status`, `quit`) are
//! read from stdin.

pub mod config;
pub mod console;
pub mod footage;
pub mod sink;
