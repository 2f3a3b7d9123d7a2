use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::video::decoder::VideoDecoder;
use crate::video::frame::Frame;

/// Fatal conditions while opening a frame source. Anything after a
/// successful open is a per-frame problem, not a source error.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read directory {path}")]
    DirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no image files found in directory {0}")]
    NoImages(PathBuf),
    #[error("failed to open video {path}: {cause}")]
    VideoOpen { path: PathBuf, cause: anyhow::Error },
}

/// A pull-based supplier of frames, backed by either a video stream or a
/// directory of still images.
pub trait FrameSource {
    /// Total number of frames, when the backend can know it up front.
    fn frame_count(&self) -> Option<u64>;

    /// Native frame rate, when the backend has one.
    fn fps(&self) -> Option<f64>;

    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Frames decoded sequentially from a video file.
pub struct VideoSource {
    decoder: VideoDecoder,
}

impl VideoSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let decoder = VideoDecoder::open(path).map_err(|cause| SourceError::VideoOpen {
            path: path.to_path_buf(),
            cause,
        })?;
        Ok(Self { decoder })
    }
}

impl FrameSource for VideoSource {
    fn frame_count(&self) -> Option<u64> {
        self.decoder.frame_count()
    }

    fn fps(&self) -> Option<f64> {
        Some(self.decoder.fps())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        // A corrupt stream position ends the stream; there is no retry.
        match self.decoder.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "video decode failed, ending stream");
                None
            }
        }
    }
}

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Frames read from a lexicographically-sorted directory of still images.
///
/// Sorting by path is the ordering contract; file timestamps play no part.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next_index: usize,
    frames_yielded: u64,
    fps: f64,
}

impl ImageSequenceSource {
    /// List the directory, keep files with a recognized image extension
    /// (case-insensitive), and sort them. An unreadable directory or one
    /// without any matching file is the one unrecoverable input condition.
    ///
    /// `fps` has no effect on ordering; it only stamps frame timestamps.
    pub fn open(dir: &Path, fps: f64) -> Result<Self, SourceError> {
        let entries = fs::read_dir(dir).map_err(|source| SourceError::DirUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let recognized = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if recognized {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(SourceError::NoImages(dir.to_path_buf()));
        }

        info!(count = paths.len(), dir = %dir.display(), "found image files");

        Ok(Self {
            paths,
            next_index: 0,
            frames_yielded: 0,
            fps,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame_count(&self) -> Option<u64> {
        Some(self.paths.len() as u64)
    }

    fn fps(&self) -> Option<f64> {
        // A still-image directory has no intrinsic rate; the run config
        // supplies one.
        None
    }

    fn next_frame(&mut self) -> Option<Frame> {
        // An unreadable file is a per-frame failure: warn and advance.
        // Only running out of files ends the stream.
        while self.next_index < self.paths.len() {
            let path = &self.paths[self.next_index];
            self.next_index += 1;

            match image::open(path) {
                Ok(decoded) => {
                    let frame_number = self.frames_yielded;
                    let timestamp_seconds = if self.fps > 0.0 {
                        frame_number as f64 / self.fps
                    } else {
                        0.0
                    };
                    self.frames_yielded += 1;
                    return Some(Frame {
                        image: decoded.to_rgb8(),
                        frame_number,
                        timestamp_seconds,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read image, skipping");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_image(dir: &Path, name: &str, size: u32) {
        let img = RgbImage::from_pixel(size, size, Rgb([50, 100, 150]));
        let path = dir.join(name);
        let format = if name.to_ascii_lowercase().ends_with(".png") {
            image::ImageFormat::Png
        } else {
            image::ImageFormat::Jpeg
        };
        img.save_with_format(&path, format).unwrap();
    }

    #[test]
    fn yields_files_in_lexicographic_order() {
        let dir = TempDir::new().unwrap();
        write_image(dir.path(), "b.jpg", 3);
        write_image(dir.path(), "a.png", 2);
        write_image(dir.path(), "c.JPG", 4);
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();
        std::fs::write(dir.path().join("x.bmp"), "wrong extension").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 30.0).unwrap();
        assert_eq!(source.frame_count(), Some(3));
        assert_eq!(source.fps(), None);

        let sizes: Vec<(u32, u32)> =
            std::iter::from_fn(|| source.next_frame().map(|f| f.image.dimensions())).collect();
        assert_eq!(sizes, vec![(2, 2), (3, 3), (4, 4)]);
    }

    #[test]
    fn unreadable_file_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_image(dir.path(), "a.png", 2);
        std::fs::write(dir.path().join("b.jpg"), "not a real jpeg").unwrap();
        write_image(dir.path(), "c.png", 4);

        let mut source = ImageSequenceSource::open(dir.path(), 30.0).unwrap();
        assert_eq!(source.frame_count(), Some(3));

        let first = source.next_frame().unwrap();
        assert_eq!(first.image.dimensions(), (2, 2));
        assert_eq!(first.frame_number, 0);

        // b.jpg fails to decode and is skipped.
        let second = source.next_frame().unwrap();
        assert_eq!(second.image.dimensions(), (4, 4));
        assert_eq!(second.frame_number, 1);

        assert!(source.next_frame().is_none());
    }

    #[test]
    fn frame_timestamps_follow_configured_rate() {
        let dir = TempDir::new().unwrap();
        write_image(dir.path(), "a.png", 2);
        write_image(dir.path(), "b.png", 2);

        let mut source = ImageSequenceSource::open(dir.path(), 10.0).unwrap();
        assert_eq!(source.next_frame().unwrap().timestamp_seconds, 0.0);
        assert_eq!(source.next_frame().unwrap().timestamp_seconds, 0.1);
    }

    #[test]
    fn empty_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = ImageSequenceSource::open(dir.path(), 30.0).unwrap_err();
        assert!(matches!(err, SourceError::NoImages(_)));
    }

    #[test]
    fn missing_directory_is_fatal() {
        let err =
            ImageSequenceSource::open(Path::new("/nonexistent/birdseye-frames"), 30.0).unwrap_err();
        assert!(matches!(err, SourceError::DirUnreadable { .. }));
    }
}
