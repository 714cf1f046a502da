//! Render sink — shows the processed feed.
//!
//! The console has no window; the current processed frame is written to
//! a file that any image viewer can keep open. Writes go through a
//! temporary file and a rename so a viewer never reads a torn image.
//!
//! The render loop copies the current frame out of the render state
//! before touching the disk, so a slow write never holds up the
//! controller publishing the next frame.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use cctv_core::{InboundFrame, RenderView};

/// Text shown while no processed frame has arrived.
pub const PLACEHOLDER: &str = "Live Stream Feed";

/// What a sink gets to show: the payload of the current frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub data: Bytes,
    /// 1-based arrival index.
    pub sequence: u64,
}

impl From<&InboundFrame> for RenderedFrame {
    fn from(frame: &InboundFrame) -> Self {
        Self {
            data: frame.data.clone(),
            sequence: frame.sequence,
        }
    }
}

/// Something that can display the current processed frame.
///
/// `render` may block; the loop runs it on the blocking pool.
pub trait RenderSink: Send + 'static {
    /// Show `frame`, or the placeholder when `None`.
    fn render(&mut self, frame: Option<&RenderedFrame>);
}

/// Writes the current frame to a file.
pub struct FileSink {
    path: PathBuf,
    tmp_path: PathBuf,
    showing_placeholder: bool,
    frames_written: u64,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            showing_placeholder: false,
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames successfully written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write_atomically(&self, data: &[u8]) -> std::io::Result<()> {
        std::fs::write(&self.tmp_path, data)?;
        std::fs::rename(&self.tmp_path, &self.path)
    }
}

impl RenderSink for FileSink {
    fn render(&mut self, frame: Option<&RenderedFrame>) {
        match frame {
            Some(frame) => {
                self.showing_placeholder = false;
                match self.write_atomically(&frame.data) {
                    Ok(()) => {
                        self.frames_written += 1;
                        debug!(sequence = frame.sequence, "rendered to {}", self.path.display());
                    }
                    Err(e) => warn!("render to {} failed: {e}", self.path.display()),
                }
            }
            None if !self.showing_placeholder => {
                self.showing_placeholder = true;
                info!("{PLACEHOLDER}");
            }
            None => {}
        }
    }
}

/// Drive `sink` from `view` until the controller goes away.
///
/// Frames published while the sink is busy coalesce; only the latest
/// one is rendered next.
pub async fn run_render_loop<S: RenderSink>(
    mut view: RenderView,
    mut sink: S,
) -> Result<S, JoinError> {
    loop {
        let current = view.with_current(|frame| frame.map(RenderedFrame::from));
        sink = tokio::task::spawn_blocking(move || {
            sink.render(current.as_ref());
            sink
        })
        .await?;

        if !view.changed().await {
            return Ok(sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use cctv_core::{
        ConnectionState, DisplayRegistry, FrameSequence, FrameTransport, SendOutcome, StreamConfig,
        StreamingController, TransportEvent,
    };
    use tokio::sync::mpsc;

    fn frame(data: &'static [u8], sequence: u64) -> RenderedFrame {
        RenderedFrame {
            data: Bytes::from_static(data),
            sequence,
        }
    }

    #[test]
    fn writes_current_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("live.jpg"));

        sink.render(None);
        assert!(!sink.path().exists());

        sink.render(Some(&frame(b"first", 1)));
        sink.render(Some(&frame(b"second", 2)));
        assert_eq!(std::fs::read(sink.path()).unwrap(), b"second");
        assert_eq!(sink.frames_written(), 2);
        assert!(!dir.path().join("live.jpg.tmp").exists());
    }

    #[test]
    fn unwritable_target_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("missing").join("live.jpg"));
        sink.render(Some(&frame(b"x", 1)));
        assert_eq!(sink.frames_written(), 0);
    }

    // ── Render loop ──────────────────────────────────────────────

    struct IdleTransport;

    impl FrameTransport for IdleTransport {
        fn state(&self) -> ConnectionState {
            ConnectionState::Open
        }

        fn send(&self, _payload: Bytes) -> SendOutcome {
            SendOutcome::Sent
        }

        fn close(&self) {}
    }

    /// Sink that reports each frame it starts on, then takes its time.
    struct SlowSink {
        started: mpsc::UnboundedSender<u64>,
        delay: Duration,
        last: Option<u64>,
    }

    impl RenderSink for SlowSink {
        fn render(&mut self, frame: Option<&RenderedFrame>) {
            if let Some(frame) = frame {
                let _ = self.started.send(frame.sequence);
                std::thread::sleep(self.delay);
                self.last = Some(frame.sequence);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_render_does_not_hold_up_publishing() {
        let (events_tx, events_rx) = mpsc::channel(16);
        let controller = StreamingController::spawn(
            &StreamConfig::default(),
            Arc::new(FrameSequence::new(Vec::new(), 10.0, false)),
            IdleTransport,
            events_rx,
            DisplayRegistry::new(),
        );

        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let sink = SlowSink {
            started: started_tx,
            delay: Duration::from_millis(400),
            last: None,
        };
        let render = tokio::spawn(run_render_loop(controller.render_view(), sink));

        events_tx
            .send(TransportEvent::Message(Bytes::from_static(b"A")))
            .await
            .unwrap();
        let first = tokio::time::timeout(Duration::from_secs(2), started_rx.recv())
            .await
            .unwrap();
        assert_eq!(first, Some(1));

        // The sink is now busy writing frame 1.
        for payload in [&b"B"[..], b"C"] {
            events_tx
                .send(TransportEvent::Message(Bytes::copy_from_slice(payload)))
                .await
                .unwrap();
        }
        let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
        while controller.stats().frames_received < 3 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "publishing blocked behind the sink"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Frames published during the write coalesce into the latest.
        let next = tokio::time::timeout(Duration::from_secs(2), started_rx.recv())
            .await
            .unwrap();
        assert_eq!(next, Some(3));

        controller.shutdown().await;
        let sink = render.await.unwrap().unwrap();
        assert_eq!(sink.last, Some(3));
    }
}
