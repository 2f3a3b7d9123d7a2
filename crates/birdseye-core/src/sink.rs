use anyhow::Result;
use image::RgbImage;

use crate::video::encoder::VideoEncoder;

/// A push-based consumer of composed frames.
///
/// A failed write is frame-local: the driver logs it, drops the frame, and
/// keeps going. Only `finish` failures are fatal, because skipping the
/// finalize step leaves a truncated output file.
pub trait FrameSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    /// Flush and close the sink. Called exactly once at the end of a run.
    fn finish(&mut self) -> Result<()>;
}

impl FrameSink for VideoEncoder {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        VideoEncoder::write_frame(self, image)
    }

    fn finish(&mut self) -> Result<()> {
        VideoEncoder::finish(self)
    }
}
