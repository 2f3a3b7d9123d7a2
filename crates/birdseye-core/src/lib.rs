//! Bird's-eye road-view pipeline.
//!
//! Rectifies each frame of a front-facing video (or an ordered directory of
//! still images) into a bird's-eye perspective and composites the rectified
//! view back onto the frame as a picture-in-picture inset, writing the result
//! to an output video. Individual bad frames are skipped, never fatal.

pub mod perf;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod transform;
pub mod video;
