use image::RgbImage;

/// A single frame pulled from a source, owned by one pipeline iteration.
pub struct Frame {
    /// The frame's raster data, mutated in place by the transform stages.
    pub image: RgbImage,
    /// Read order from the start of the source (0-based).
    pub frame_number: u64,
    /// Elapsed seconds from the start of the source.
    pub timestamp_seconds: f64,
}
