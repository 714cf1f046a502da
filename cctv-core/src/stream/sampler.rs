//! Frame sampler: snapshot the video source and JPEG-encode it.
//!
//! The sampler owns a scratch raster that is reused across calls and
//! resized only when the source's intrinsic dimensions change.

use std::time::Instant;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use tracing::{debug, trace};

use crate::stream::playback::VideoSource;
use crate::stream::types::SampledFrame;

/// Snapshots a [`VideoSource`] into compressed [`SampledFrame`]s.
pub struct FrameSampler {
    /// Scratch raster, sized to the last sampled source.
    surface: RgbImage,
    /// JPEG quality, 1..=100.
    quality: u8,
    /// Number of frames produced so far.
    frame_count: u64,
}

impl FrameSampler {
    /// Create a sampler encoding at `quality` (1..=100).
    pub fn new(quality: u8) -> Self {
        Self {
            surface: RgbImage::new(0, 0),
            quality: quality.clamp(1, 100),
            frame_count: 0,
        }
    }

    /// Sample the current content of `source`.
    ///
    /// Returns `None` when the source is paused, ended or not ready, or
    /// when encoding fails. `None` means "skip this tick".
    pub fn capture(&mut self, source: &dyn VideoSource) -> Option<SampledFrame> {
        let status = source.status();
        if !status.can_present() {
            trace!(?status, "source cannot present a frame");
            return None;
        }

        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            trace!("source has no intrinsic dimensions yet");
            return None;
        }

        if self.surface.dimensions() != (width, height) {
            debug!(width, height, "resizing sampling surface");
            self.surface = RgbImage::new(width, height);
        }

        let captured_at = Instant::now();
        if !source.snapshot(&mut self.surface) {
            trace!("source snapshot was empty");
            return None;
        }

        let mut data = Vec::with_capacity(encode_capacity(width, height));
        let encoded = JpegEncoder::new_with_quality(&mut data, self.quality).encode(
            self.surface.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        );
        if let Err(e) = encoded {
            debug!("jpeg encode failed: {e}");
            return None;
        }

        self.frame_count += 1;
        Some(SampledFrame {
            data: Bytes::from(data),
            width,
            height,
            captured_at,
        })
    }

    /// Dimensions of the scratch raster.
    pub fn surface_dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// JPEG quality in use.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Number of frames produced so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Initial output buffer size: about one byte per eight pixels.
fn encode_capacity(width: u32, height: u32) -> usize {
    (width as usize).saturating_mul(height as usize) / 8
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::playback::FrameSequence;
    use image::Rgb;
    use std::time::Duration;

    fn noisy(w: u32, h: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = (x.wrapping_mul(73) ^ y.wrapping_mul(151) ^ seed).wrapping_mul(2654435761);
            Rgb([(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8])
        })
    }

    fn playing(frames: Vec<RgbImage>) -> FrameSequence {
        let seq = FrameSequence::new(frames, 10.0, true);
        seq.play();
        seq
    }

    #[test]
    fn paused_source_yields_nothing() {
        let seq = FrameSequence::new(vec![noisy(32, 16, 1)], 10.0, false);
        let mut sampler = FrameSampler::new(50);
        assert!(sampler.capture(&seq).is_none());
        // No side effect: the surface was never sized.
        assert_eq!(sampler.surface_dimensions(), (0, 0));
        assert_eq!(sampler.frame_count(), 0);
    }

    #[test]
    fn not_ready_source_yields_nothing() {
        let seq = playing(Vec::new());
        let mut sampler = FrameSampler::new(50);
        assert!(sampler.capture(&seq).is_none());
    }

    #[test]
    fn ended_source_yields_nothing() {
        let seq = FrameSequence::new(vec![noisy(8, 8, 1)], 10.0, false);
        seq.play();
        seq.seek(Duration::from_secs(10));
        let mut sampler = FrameSampler::new(50);
        assert!(sampler.capture(&seq).is_none());
    }

    #[test]
    fn playing_source_yields_jpeg() {
        let seq = playing(vec![noisy(32, 16, 1)]);
        let mut sampler = FrameSampler::new(50);
        let frame = sampler.capture(&seq).expect("frame");

        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&frame.data).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);
        assert_eq!(sampler.frame_count(), 1);
    }

    #[test]
    fn surface_follows_source_dimensions() {
        let mut sampler = FrameSampler::new(50);

        let small = playing(vec![noisy(8, 8, 1)]);
        sampler.capture(&small).unwrap();
        assert_eq!(sampler.surface_dimensions(), (8, 8));

        let large = playing(vec![noisy(24, 12, 2)]);
        let frame = sampler.capture(&large).unwrap();
        assert_eq!(sampler.surface_dimensions(), (24, 12));
        assert_eq!((frame.width, frame.height), (24, 12));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let seq = playing(vec![noisy(64, 64, 7)]);
        let low = FrameSampler::new(10).capture(&seq).unwrap();
        let high = FrameSampler::new(95).capture(&seq).unwrap();
        assert!(low.data.len() < high.data.len());
    }

    #[test]
    fn encode_capacity_handles_huge_frames() {
        assert_eq!(encode_capacity(64, 48), 384);
        assert_eq!(encode_capacity(70_000, 70_000), 612_500_000);
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(FrameSampler::new(0).quality(), 1);
        assert_eq!(FrameSampler::new(255).quality(), 100);
    }
}
