use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing::{debug, error, warn};

/// Fixed offsets defining the source and destination quadrilaterals of the
/// perspective map. Not derived from camera calibration; tuned for a single
/// front-facing camera geometry.
#[derive(Debug, Clone, Copy)]
pub struct TransformParameters {
    /// Horizontal inset of the destination quad's bottom corners.
    pub param1: i64,
    /// Vertical offset below the frame midline where the road trapezoid starts.
    pub param2: i64,
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self {
            param1: 570,
            param2: 35,
        }
    }
}

/// Soft per-frame time budget for the warp; overruns are logged, never fatal.
const RECTIFY_BUDGET_MS: f64 = 10.0;

/// Applies the fixed bird's-eye perspective transform to frames.
pub struct Rectifier {
    params: TransformParameters,
}

impl Rectifier {
    pub fn new(params: TransformParameters) -> Self {
        Self { params }
    }

    /// Warp a frame into a bird's-eye view of the same dimensions.
    ///
    /// The road-plane trapezoid (the lower half of the frame, shifted down by
    /// `param2`) is stretched into a rectangle twice the frame height, then
    /// the result is resized back to the input dimensions. Never fails past
    /// this boundary: degenerate geometry logs an error and returns the input
    /// unchanged, so downstream stages always have a valid frame.
    pub fn rectify(&self, image: &RgbImage) -> RgbImage {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        debug!(width, height, "rectifying frame");

        let w = width as f32;
        let h = height as f32;
        let p1 = self.params.param1 as f32;
        let p2 = self.params.param2 as f32;

        let source = [(0.0, h / 2.0 + p2), (w, h / 2.0 + p2), (w, h), (0.0, h)];
        let destination = [(0.0, 0.0), (w, 0.0), (w - p1, h * 2.0), (p1, h * 2.0)];

        let Some(projection) = Projection::from_control_points(source, destination) else {
            error!(
                param1 = self.params.param1,
                param2 = self.params.param2,
                width,
                height,
                "perspective transform is degenerate, returning frame unchanged"
            );
            return image.clone();
        };

        let mut canvas = RgbImage::new(width, height * 2);
        warp_into(
            image,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
            &mut canvas,
        );
        let rectified = imageops::resize(&canvas, width, height, FilterType::Triangle);

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if elapsed_ms > RECTIFY_BUDGET_MS {
            warn!(
                elapsed_ms,
                budget_ms = RECTIFY_BUDGET_MS,
                "rectification over time budget"
            );
        }

        rectified
    }
}
