//! Loads local footage into a playable [`FrameSequence`].
//!
//! Footage is a directory of still frames (`.jpg`, `.jpeg`, `.png`,
//! `.bmp`) played back in file-name order.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use cctv_core::{FrameSequence, StreamError};

const EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Decode every frame under `dir` into a sequence.
///
/// Files that fail to decode are skipped with a warning. An empty
/// directory yields an empty (never ready) sequence.
pub fn load_footage(dir: &Path, fps: f64, looping: bool) -> Result<FrameSequence, StreamError> {
    let paths = frame_paths(dir)?;
    let mut frames: Vec<RgbImage> = Vec::with_capacity(paths.len());

    for path in &paths {
        match image::open(path) {
            Ok(img) => frames.push(img.to_rgb8()),
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }

    info!(
        dir = %dir.display(),
        frames = frames.len(),
        fps,
        looping,
        "footage loaded"
    );
    Ok(FrameSequence::new(frames, fps, looping))
}

/// Image files directly under `dir`, sorted by file name.
fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>, StreamError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_frame && path.is_file() {
            paths.push(path);
        } else {
            debug!("ignoring {}", path.display());
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cctv_core::VideoSource;
    use image::Rgb;

    #[test]
    fn loads_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(8, 6, Rgb([200, 0, 0]))
            .save(dir.path().join("frame_002.png"))
            .unwrap();
        RgbImage::from_pixel(8, 6, Rgb([0, 200, 0]))
            .save(dir.path().join("frame_001.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let seq = load_footage(dir.path(), 10.0, false).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.dimensions(), (8, 6));

        let mut surface = RgbImage::new(8, 6);
        assert!(seq.snapshot(&mut surface));
        assert_eq!(surface.get_pixel(0, 0), &Rgb([0, 200, 0]));
    }

    #[test]
    fn undecodable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"definitely not a jpeg").unwrap();
        let seq = load_footage(dir.path(), 10.0, false).unwrap();
        assert!(seq.is_empty());
        assert!(!seq.status().ready);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_footage(&dir.path().join("missing"), 10.0, false).unwrap_err();
        assert!(matches!(err, StreamError::Io(_)));
    }
}
