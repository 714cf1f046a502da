//! Streaming controller: the composition root of the pipeline.
//!
//! Runs a single task that interleaves user commands, sampling ticks,
//! encode completions and transport events:
//!
//! ```text
//!   start/stop ──► ┌──────────────────────────┐ ──► FrameTransport::send
//!   ticker     ──► │  StreamLoop (one task)   │
//!   encoder    ──► │  commands > events >     │ ──► render state (watch)
//!   transport  ──► │  encodes  > ticks        │ ──► stats / session (watch)
//!                  └──────────────────────────┘
//! ```
//!
//! Commands are always polled first, so a stop takes effect before any
//! tick that was already due. Only one encode runs at a time: the
//! sampler itself is moved into the blocking task and a tick that finds
//! it missing is skipped.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::stream::display::{DisplayRegistry, InboundFrame, RenderView};
use crate::stream::playback::VideoSource;
use crate::stream::sampler::FrameSampler;
use crate::stream::transport::{FrameTransport, TransportEvent, TransportEvents};
use crate::stream::types::{
    ConnectionState, SampledFrame, SendOutcome, StreamStats, StreamingSession,
};

#[derive(Debug, Clone, Copy)]
enum Command {
    Start,
    Stop,
    Shutdown,
}

type EncodeJob = JoinHandle<(FrameSampler, Option<SampledFrame>)>;

// ── StreamingController ──────────────────────────────────────────

/// Handle to a running streaming pipeline.
///
/// Dropping the handle tears the pipeline down the same way
/// [`shutdown`](Self::shutdown) does, without waiting for it.
pub struct StreamingController {
    commands: mpsc::UnboundedSender<Command>,
    session_rx: watch::Receiver<StreamingSession>,
    connection_rx: watch::Receiver<ConnectionState>,
    stats_rx: watch::Receiver<StreamStats>,
    render_rx: watch::Receiver<Option<InboundFrame>>,
    task: JoinHandle<()>,
}

impl StreamingController {
    /// Spawn the controller task.
    ///
    /// The controller subscribes to `events` for the transport's whole
    /// lifetime and owns `transport` until teardown.
    pub fn spawn<T: FrameTransport>(
        config: &StreamConfig,
        source: Arc<dyn VideoSource>,
        transport: T,
        events: TransportEvents,
        registry: Arc<DisplayRegistry>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = watch::channel(StreamingSession::Idle);
        let (connection_tx, connection_rx) = watch::channel(transport.state());
        let (stats_tx, stats_rx) = watch::channel(StreamStats::default());
        let (render_tx, render_rx) = watch::channel(None);

        let stream_loop = StreamLoop {
            commands: commands_rx,
            events: Some(events),
            transport,
            source,
            registry,
            sampler: Some(FrameSampler::new(config.jpeg_quality())),
            quality: config.jpeg_quality(),
            period: config.tick_interval(),
            ticker: None,
            encode: None,
            stats: StreamStats::default(),
            session_tx,
            connection_tx,
            stats_tx,
            render_tx,
        };

        Self {
            commands: commands_tx,
            session_rx,
            connection_rx,
            stats_rx,
            render_rx,
            task: tokio::spawn(stream_loop.run()),
        }
    }

    /// Start signal (mapped from the playback surface's `play`).
    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    /// Stop signal (mapped from `pause`). Safe to call while idle.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Current sampling state.
    pub fn session(&self) -> StreamingSession {
        *self.session_rx.borrow()
    }

    /// Current transport state as last reported by the transport.
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_rx.borrow()
    }

    /// Latest counters.
    pub fn stats(&self) -> StreamStats {
        self.stats_rx.borrow().clone()
    }

    /// Receiver for session changes.
    pub fn session_receiver(&self) -> watch::Receiver<StreamingSession> {
        self.session_rx.clone()
    }

    /// Read side of the render state for a sink.
    pub fn render_view(&self) -> RenderView {
        RenderView::new(self.render_rx.clone())
    }

    /// Tear down: cancel the timer, close the transport and release the
    /// current display handle. Waits for the controller task to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!("streaming controller task failed: {e}");
        }
    }
}

// ── StreamLoop ───────────────────────────────────────────────────

struct StreamLoop<T: FrameTransport> {
    commands: mpsc::UnboundedReceiver<Command>,
    /// `None` once the transport's event stream has ended.
    events: Option<TransportEvents>,
    transport: T,
    source: Arc<dyn VideoSource>,
    registry: Arc<DisplayRegistry>,
    /// `None` while an encode is in flight.
    sampler: Option<FrameSampler>,
    quality: u8,
    period: Duration,
    /// `Some` exactly while the session is active.
    ticker: Option<Interval>,
    encode: Option<EncodeJob>,
    stats: StreamStats,
    session_tx: watch::Sender<StreamingSession>,
    connection_tx: watch::Sender<ConnectionState>,
    stats_tx: watch::Sender<StreamStats>,
    render_tx: watch::Sender<Option<InboundFrame>>,
}

impl<T: FrameTransport> StreamLoop<T> {
    async fn run(mut self) {
        debug!(period = ?self.period, quality = self.quality, "streaming controller running");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Start) => self.start(),
                    Some(Command::Stop) => self.stop(),
                    Some(Command::Shutdown) | None => break,
                },

                event = next_event(&mut self.events), if self.events.is_some() => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        debug!("transport event stream ended");
                        self.events = None;
                    }
                },

                job = finish_encode(&mut self.encode), if self.encode.is_some() => {
                    self.encode = None;
                    self.on_encoded(job);
                }

                _ = next_tick(&mut self.ticker), if self.ticker.is_some() => self.on_tick(),
            }
        }

        self.teardown();
    }

    // ── Session control ──────────────────────────────────────────

    fn start(&mut self) {
        if self.ticker.is_some() {
            trace!("start ignored: already active");
            return;
        }
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.session_tx.send_replace(StreamingSession::Active);
        info!("streaming started");
    }

    fn stop(&mut self) {
        if self.ticker.take().is_none() {
            trace!("stop ignored: already idle");
            return;
        }
        self.session_tx.send_replace(StreamingSession::Idle);
        info!("streaming stopped");
    }

    // ── Outbound path ────────────────────────────────────────────

    fn on_tick(&mut self) {
        self.stats.ticks += 1;

        let Some(mut sampler) = self.sampler.take() else {
            trace!("tick skipped: previous encode still running");
            self.stats.skipped_busy += 1;
            self.publish_stats();
            return;
        };

        if !self.source.status().can_present() {
            self.sampler = Some(sampler);
            self.stats.skipped_not_ready += 1;
            self.publish_stats();
            return;
        }

        let source = Arc::clone(&self.source);
        self.encode = Some(tokio::task::spawn_blocking(move || {
            let frame = sampler.capture(source.as_ref());
            (sampler, frame)
        }));
        self.publish_stats();
    }

    fn on_encoded(&mut self, job: Result<(FrameSampler, Option<SampledFrame>), tokio::task::JoinError>) {
        let frame = match job {
            Ok((sampler, frame)) => {
                self.sampler = Some(sampler);
                frame
            }
            Err(e) => {
                warn!("encode task failed: {e}; resetting sampler");
                self.sampler = Some(FrameSampler::new(self.quality));
                None
            }
        };

        let Some(frame) = frame else {
            self.stats.skipped_not_ready += 1;
            self.publish_stats();
            return;
        };

        let len = frame.data.len() as u64;
        match self.transport.send(frame.data) {
            SendOutcome::Sent => {
                trace!(len, width = frame.width, height = frame.height, "frame sent");
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += len;
            }
            SendOutcome::Refused => {
                trace!(len, "frame dropped: transport refused");
                self.stats.frames_refused += 1;
            }
        }
        self.publish_stats();
    }

    // ── Inbound path ─────────────────────────────────────────────

    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                info!("backend connection open");
                self.connection_tx.send_replace(ConnectionState::Open);
            }
            TransportEvent::Closed => {
                info!("backend connection closed");
                self.connection_tx.send_replace(ConnectionState::Closed);
            }
            TransportEvent::Errored(reason) => {
                warn!("backend connection errored: {reason}");
                self.connection_tx.send_replace(ConnectionState::Closed);
            }
            TransportEvent::Message(data) => self.publish_inbound(data),
        }
    }

    /// Mint a handle for `data` and make it current, releasing the
    /// previous one inside the same write-locked update.
    fn publish_inbound(&mut self, data: Bytes) {
        self.stats.frames_received += 1;
        self.stats.bytes_received += data.len() as u64;

        let frame = InboundFrame {
            handle: self.registry.mint(data.clone()),
            data,
            sequence: self.stats.frames_received,
            received_at: std::time::Instant::now(),
        };
        trace!(sequence = frame.sequence, uri = %frame.handle.uri(), "publishing inbound frame");

        self.render_tx.send_modify(|current| {
            if let Some(previous) = current.take() {
                previous.handle.release();
            }
            *current = Some(frame);
        });
        self.publish_stats();
    }

    // ── Teardown ─────────────────────────────────────────────────

    fn teardown(&mut self) {
        self.ticker = None;
        self.session_tx.send_replace(StreamingSession::Idle);

        if self.encode.take().is_some() {
            debug!("abandoning in-flight encode");
        }

        self.transport.close();
        self.connection_tx.send_replace(ConnectionState::Closed);

        self.render_tx.send_modify(|current| {
            if let Some(previous) = current.take() {
                previous.handle.release();
            }
        });

        info!(
            sent = self.stats.frames_sent,
            refused = self.stats.frames_refused,
            received = self.stats.frames_received,
            "streaming controller stopped"
        );
    }

    fn publish_stats(&self) {
        self.stats_tx.send_replace(self.stats.clone());
    }
}

// ── select! helpers ──────────────────────────────────────────────

async fn next_event(events: &mut Option<TransportEvents>) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn finish_encode(
    job: &mut Option<EncodeJob>,
) -> Result<(FrameSampler, Option<SampledFrame>), tokio::task::JoinError> {
    match job {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────
