//! Display handles and the render state read by the sink.
//!
//! A [`DisplayHandle`] is a locally minted, locally revocable reference
//! to an inbound image (`blob:cctv/<id>`). Handles are owned values:
//! dropping one revokes it, so creation and release always pair up 1:1.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{trace, warn};

const URI_PREFIX: &str = "blob:cctv/";

// ── DisplayRegistry ──────────────────────────────────────────────

/// Table of live display handles.
#[derive(Default)]
pub struct DisplayRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, Bytes>>,
    minted: AtomicU64,
    released: AtomicU64,
}

impl DisplayRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mint a new handle for `data`.
    pub fn mint(self: &Arc<Self>, data: Bytes) -> DisplayHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock_live().insert(id, data);
        self.minted.fetch_add(1, Ordering::Relaxed);
        trace!(id, "display handle minted");
        DisplayHandle {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Look up the bytes behind a `blob:cctv/<id>` URI, if still live.
    pub fn resolve(&self, uri: &str) -> Option<Bytes> {
        let id = uri.strip_prefix(URI_PREFIX)?.parse::<u64>().ok()?;
        self.lock_live().get(&id).cloned()
    }

    /// Whether the handle with `id` has not been released yet.
    pub fn is_live(&self, id: u64) -> bool {
        self.lock_live().contains_key(&id)
    }

    /// Handles currently live.
    pub fn live_count(&self) -> usize {
        self.lock_live().len()
    }

    /// Handles minted since construction.
    pub fn minted(&self) -> u64 {
        self.minted.load(Ordering::Relaxed)
    }

    /// Handles released since construction.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    fn revoke(&self, id: u64) {
        if self.lock_live().remove(&id).is_some() {
            self.released.fetch_add(1, Ordering::Relaxed);
            trace!(id, "display handle released");
        } else {
            warn!(id, "display handle released twice");
        }
    }

    fn lock_live(&self) -> MutexGuard<'_, HashMap<u64, Bytes>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── DisplayHandle ────────────────────────────────────────────────

/// Owned reference to a displayable image. Released on drop.
pub struct DisplayHandle {
    id: u64,
    registry: Arc<DisplayRegistry>,
}

impl DisplayHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The `blob:cctv/<id>` URI a sink can resolve.
    pub fn uri(&self) -> String {
        format!("{URI_PREFIX}{}", self.id)
    }

    /// Release the handle now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.registry.revoke(self.id);
    }
}

impl fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DisplayHandle").field(&self.uri()).finish()
    }
}

// ── InboundFrame ─────────────────────────────────────────────────

/// A frame received from the backend, paired with its display handle.
#[derive(Debug)]
pub struct InboundFrame {
    /// Raw payload as received (JPEG by convention, not validated).
    pub data: Bytes,
    /// Handle the sink displays.
    pub handle: DisplayHandle,
    /// 1-based arrival index.
    pub sequence: u64,
    /// Arrival time.
    pub received_at: Instant,
}

// ── RenderView ───────────────────────────────────────────────────

/// Read side of the render state.
///
/// The current frame is only reachable by reference while the view
/// holds the state's read lock, so a sink can never observe a released
/// handle.
#[derive(Clone)]
pub struct RenderView {
    rx: watch::Receiver<Option<InboundFrame>>,
}

impl RenderView {
    pub(crate) fn new(rx: watch::Receiver<Option<InboundFrame>>) -> Self {
        Self { rx }
    }

    /// Wait for the render state to change.
    ///
    /// Returns `false` once the controller is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Run `f` against the current frame (`None` = placeholder) and mark
    /// it as seen.
    pub fn with_current<R>(&mut self, f: impl FnOnce(Option<&InboundFrame>) -> R) -> R {
        let current = self.rx.borrow_and_update();
        f(current.as_ref())
    }

    /// Bytes of the current frame, if any.
    pub fn current_bytes(&self) -> Option<Bytes> {
        self.rx.borrow().as_ref().map(|f| f.data.clone())
    }

    /// URI of the current frame's handle, if any.
    pub fn current_uri(&self) -> Option<String> {
        self.rx.borrow().as_ref().map(|f| f.handle.uri())
    }
}
