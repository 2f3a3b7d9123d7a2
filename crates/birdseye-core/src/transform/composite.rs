use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::{debug, error};

/// Placement and sizing of the picture-in-picture inset.
#[derive(Debug, Clone, Copy)]
pub struct InsetLayout {
    /// Inset height is the main frame height divided by this.
    pub ratio: u32,
    /// Width of the solid white border on all four sides, in pixels.
    pub border: u32,
    /// Gap between the inset's right edge and the main frame's right edge.
    pub x_margin: i64,
    /// Applied to the vertically-centered y position; negative shifts upward.
    pub y_offset_adjust: i64,
}

impl Default for InsetLayout {
    fn default() -> Self {
        Self {
            ratio: 3,
            border: 3,
            x_margin: 30,
            y_offset_adjust: -100,
        }
    }
}

/// Paste a resized, white-bordered copy of `inset` onto `main` in place.
///
/// A placement that does not fully fit inside the main frame is skipped
/// without touching the frame (the default layout produces a negative y for
/// small frames, which lands here). Zero-area inputs are logged and skipped
/// the same way. Nothing in this stage can fail the pipeline.
pub fn composite_inset(main: &mut RgbImage, inset: &RgbImage, layout: &InsetLayout) {
    let (main_w, main_h) = main.dimensions();
    let (inset_w, inset_h) = inset.dimensions();
    if main_w == 0 || main_h == 0 || inset_w == 0 || inset_h == 0 {
        error!(
            main_w,
            main_h, inset_w, inset_h, "composite input has zero area, overlay skipped"
        );
        return;
    }

    // Scale the inset to 1/ratio of the main height, keeping its aspect
    // ratio for the width.
    let new_h = main_h / layout.ratio;
    let new_w = (new_h as f64 * inset_w as f64 / inset_h as f64) as u32;
    if new_w == 0 || new_h == 0 {
        error!(new_w, new_h, "inset collapses to zero size, overlay skipped");
        return;
    }
    let resized = imageops::resize(inset, new_w, new_h, FilterType::Triangle);

    let bordered = add_border(&resized, layout.border);
    let (bordered_w, bordered_h) = bordered.dimensions();

    let x = main_w as i64 - bordered_w as i64 - layout.x_margin;
    let y = main_h as i64 / 2 - bordered_h as i64 + layout.y_offset_adjust;

    if x < 0
        || y < 0
        || x + bordered_w as i64 > main_w as i64
        || y + bordered_h as i64 > main_h as i64
    {
        debug!(
            x,
            y,
            inset_w = bordered_w,
            inset_h = bordered_h,
            main_w,
            main_h,
            "inset placement out of bounds, overlay skipped"
        );
        return;
    }

    imageops::replace(main, &bordered, x, y);
}

fn add_border(image: &RgbImage, border: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut out = RgbImage::from_pixel(w + 2 * border, h + 2 * border, Rgb([255, 255, 255]));
    imageops::replace(&mut out, image, border as i64, border as i64);
    out
}
