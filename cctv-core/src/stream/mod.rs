//! # Frame-streaming pipeline
//!
//! Samples a local video source at a fixed rate, ships each sample to the
//! analysis backend over a persistent WebSocket and renders whatever
//! processed frame the backend sends back.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   play/pause   ┌─────────────────────────┐
//! │ FrameSequence    │ ─────────────► │ StreamingController     │
//! │ (VideoSource)    │                │   ticker (sample_rate)  │
//! └────────┬─────────┘                │     ↓                   │
//!          │ snapshot                 │ FrameSampler (JPEG)     │
//!          └────────────────────────► │     ↓                   │
//!                                     │ TransportChannel::send  │ ──► backend
//!                                     │                         │
//!          RenderView ◄── current ─── │ TransportEvent::Message │ ◄── backend
//!                                     └─────────────────────────┘
//! ```
//!
//! ## Sub-modules
//!
//! | Module       | Purpose                                              |
//! |------------- |------------------------------------------------------|
//! | `types`      | Frame, session, connection and stats types           |
//! | `playback`   | `VideoSource` trait and the `FrameSequence` player   |
//! | `sampler`    | Snapshot + JPEG encode with a reused scratch raster  |
//! | `transport`  | WebSocket channel with refusal semantics             |
//! | `display`    | Display handles and the sink-facing render view      |
//! | `controller` | Clocked producer and inbound consumer                |

pub mod controller;
pub mod display;
pub mod playback;
pub mod sampler;
pub mod transport;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use controller::StreamingController;
pub use display::{DisplayHandle, DisplayRegistry, InboundFrame, RenderView};
pub use playback::{FrameSequence, PlaybackStatus, VideoSource};
pub use sampler::FrameSampler;
pub use transport::{FrameTransport, TransportChannel, TransportEvent, TransportEvents};
pub use types::{ConnectionState, SampledFrame, SendOutcome, StreamStats, StreamingSession};
