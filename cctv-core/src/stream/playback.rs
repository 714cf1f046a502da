//! Playback surface: the video content the sampler reads from.
//!
//! [`VideoSource`] is the read-only view the sampler needs. The
//! [`FrameSequence`] player is the concrete surface used by the console:
//! a list of decoded stills advanced by wall-clock time while playing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use image::RgbImage;
use tracing::debug;

// ── PlaybackStatus ───────────────────────────────────────────────

/// Snapshot of the flags that decide whether a frame can be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStatus {
    /// Playback is paused by the user.
    pub paused: bool,
    /// Playback reached the end of the content.
    pub ended: bool,
    /// Content is loaded and able to present a frame.
    pub ready: bool,
}

impl PlaybackStatus {
    /// `true` when the sampler should take a snapshot this tick.
    pub fn can_present(&self) -> bool {
        self.ready && !self.paused && !self.ended
    }
}

// ── VideoSource ──────────────────────────────────────────────────

/// Read access to decodable video content.
pub trait VideoSource: Send + Sync {
    /// Current paused / ended / ready flags.
    fn status(&self) -> PlaybackStatus;

    /// Intrinsic pixel dimensions of the frame at the current position.
    /// `(0, 0)` while nothing can be presented.
    fn dimensions(&self) -> (u32, u32);

    /// Copy the frame at the current position into `surface`.
    ///
    /// `surface` has already been sized to [`dimensions`](Self::dimensions).
    /// Returns `false` if nothing was drawn (e.g. the size changed in
    /// between).
    fn snapshot(&self, surface: &mut RgbImage) -> bool;
}

// ── FrameSequence ────────────────────────────────────────────────

#[derive(Debug)]
struct Clock {
    paused: bool,
    /// Position accumulated up to the last pause.
    position: Duration,
    /// When playback last resumed.
    resumed_at: Option<Instant>,
}

/// A sequence of still frames played back at a fixed rate.
///
/// Starts paused at position zero, like a freshly loaded video element.
#[derive(Debug)]
pub struct FrameSequence {
    frames: Vec<RgbImage>,
    frame_duration: Duration,
    looping: bool,
    clock: Mutex<Clock>,
}

impl FrameSequence {
    /// Build a sequence playing `frames` at `fps` frames per second.
    pub fn new(frames: Vec<RgbImage>, fps: f64, looping: bool) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
        Self {
            frames,
            frame_duration: Duration::from_secs_f64(1.0 / fps),
            looping,
            clock: Mutex::new(Clock {
                paused: true,
                position: Duration::ZERO,
                resumed_at: None,
            }),
        }
    }

    /// Number of frames in the sequence.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Resume playback. Restarts from the beginning if playback ended.
    pub fn play(&self) {
        let ended = self.is_ended();
        let mut clock = self.lock_clock();
        if ended {
            clock.position = Duration::ZERO;
            if clock.resumed_at.is_some() {
                clock.resumed_at = Some(Instant::now());
            }
        }
        if clock.paused {
            clock.paused = false;
            clock.resumed_at = Some(Instant::now());
            debug!(position = ?clock.position, "playback resumed");
        }
    }

    /// Pause playback, freezing the current position.
    pub fn pause(&self) {
        let mut clock = self.lock_clock();
        if let Some(resumed) = clock.resumed_at.take() {
            clock.position += resumed.elapsed();
        }
        if !clock.paused {
            clock.paused = true;
            debug!(position = ?clock.position, "playback paused");
        }
    }

    /// Jump to `position` without changing the paused flag.
    pub fn seek(&self, position: Duration) {
        let mut clock = self.lock_clock();
        clock.position = position;
        if clock.resumed_at.is_some() {
            clock.resumed_at = Some(Instant::now());
        }
    }

    /// Current playback position.
    pub fn position(&self) -> Duration {
        let clock = self.lock_clock();
        match clock.resumed_at {
            Some(resumed) => clock.position + resumed.elapsed(),
            None => clock.position,
        }
    }

    /// Index of the frame at the current position, or `None` past the end.
    pub fn current_index(&self) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        let index = (self.position().as_secs_f64() / self.frame_duration.as_secs_f64()) as usize;
        if self.looping {
            Some(index % self.frames.len())
        } else if index < self.frames.len() {
            Some(index)
        } else {
            None
        }
    }

    fn is_ended(&self) -> bool {
        !self.frames.is_empty() && self.current_index().is_none()
    }

    fn current_frame(&self) -> Option<&RgbImage> {
        self.current_index().map(|i| &self.frames[i])
    }

    fn lock_clock(&self) -> std::sync::MutexGuard<'_, Clock> {
        // A poisoned clock only means a panic mid-update of plain values.
        self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VideoSource for FrameSequence {
    fn status(&self) -> PlaybackStatus {
        let paused = self.lock_clock().paused;
        PlaybackStatus {
            paused,
            ended: self.is_ended(),
            ready: !self.frames.is_empty(),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.current_frame().map_or((0, 0), |f| f.dimensions())
    }

    fn snapshot(&self, surface: &mut RgbImage) -> bool {
        match self.current_frame() {
            Some(frame) if frame.dimensions() == surface.dimensions() => {
                surface.copy_from_slice(frame.as_raw());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, shade: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([shade, shade, shade]))
    }

    #[test]
    fn starts_paused_and_ready() {
        let seq = FrameSequence::new(vec![solid(4, 4, 0)], 10.0, false);
        let status = seq.status();
        assert!(status.paused);
        assert!(status.ready);
        assert!(!status.can_present());
        assert_eq!(seq.dimensions(), (4, 4));
    }

    #[test]
    fn empty_sequence_is_not_ready() {
        let seq = FrameSequence::new(Vec::new(), 10.0, false);
        seq.play();
        assert!(!seq.status().ready);
        assert_eq!(seq.dimensions(), (0, 0));
    }

    #[test]
    fn seek_selects_frame() {
        let seq = FrameSequence::new(vec![solid(2, 2, 0), solid(2, 2, 100), solid(2, 2, 200)], 10.0, false);
        seq.seek(Duration::from_millis(150));
        assert_eq!(seq.current_index(), Some(1));

        let mut surface = RgbImage::new(2, 2);
        assert!(seq.snapshot(&mut surface));
        assert_eq!(surface.get_pixel(0, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn past_the_end_is_ended_unless_looping() {
        let frames = vec![solid(2, 2, 0), solid(2, 2, 1)];
        let seq = FrameSequence::new(frames.clone(), 10.0, false);
        seq.seek(Duration::from_millis(500));
        assert!(seq.status().ended);
        assert_eq!(seq.dimensions(), (0, 0));

        let looped = FrameSequence::new(frames, 10.0, true);
        looped.seek(Duration::from_millis(500));
        assert!(!looped.status().ended);
        assert_eq!(looped.current_index(), Some(1));
    }

    #[test]
    fn play_after_end_restarts() {
        let seq = FrameSequence::new(vec![solid(2, 2, 0)], 10.0, false);
        seq.seek(Duration::from_secs(5));
        assert!(seq.status().ended);
        seq.play();
        assert!(!seq.status().ended);
        assert!(seq.status().can_present());
    }

    #[test]
    fn pause_freezes_position() {
        let seq = FrameSequence::new(vec![solid(2, 2, 0)], 10.0, true);
        seq.play();
        std::thread::sleep(Duration::from_millis(20));
        seq.pause();
        let frozen = seq.position();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(seq.position(), frozen);
        assert!(frozen >= Duration::from_millis(20));
    }

    #[test]
    fn snapshot_refuses_mismatched_surface() {
        let seq = FrameSequence::new(vec![solid(4, 4, 9)], 10.0, false);
        let mut surface = RgbImage::new(2, 2);
        assert!(!seq.snapshot(&mut surface));
    }
}
