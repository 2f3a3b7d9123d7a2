use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use tracing::{error, info, warn};

use crate::perf::{FrameTiming, PerformanceTracker};
use crate::sink::FrameSink;
use crate::source::{FrameSource, ImageSequenceSource, VideoSource};
use crate::transform::composite::{composite_inset, InsetLayout};
use crate::transform::rectify::{Rectifier, TransformParameters};
use crate::video::encoder::VideoEncoder;

/// Where frames come from.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    /// A video file, decoded sequentially.
    Video(PathBuf),
    /// A directory of still images, read in lexicographic order.
    Images(PathBuf),
}

/// Resolved parameters for one run. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: SourceSpec,
    pub output: PathBuf,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Target frame rate. Video sources override this with their metadata.
    pub fps: f64,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Frames that passed the full stage sequence and reached the sink.
    pub frames_processed: u64,
    pub elapsed_seconds: f64,
    /// Whether the run was stopped by the interrupt flag. A graceful stop,
    /// not a failure.
    pub interrupted: bool,
}

/// How often the driver logs coarse progress.
const PROGRESS_INTERVAL: u64 = 100;

/// Run the full rectify-and-composite pipeline over one source.
///
/// Source-open and sink-open failures are the fatal paths; once the loop is
/// running, everything is per-frame and the run carries on. The interrupt
/// flag is polled once per iteration, never mid-frame.
pub fn run_pipeline(config: &PipelineConfig, interrupt: &AtomicBool) -> Result<RunSummary> {
    info!(
        source = ?config.source,
        output = %config.output.display(),
        width = config.frame_width,
        height = config.frame_height,
        fps = config.fps,
        "pipeline starting"
    );

    let mut source: Box<dyn FrameSource> = match &config.source {
        SourceSpec::Video(path) => {
            Box::new(VideoSource::open(path).context("failed to open video source")?)
        }
        SourceSpec::Images(dir) => {
            Box::new(ImageSequenceSource::open(dir, config.fps).context("failed to open image sequence")?)
        }
    };

    let fps = source.fps().filter(|f| *f > 0.0).unwrap_or(config.fps);
    let mut sink = VideoEncoder::open(&config.output, config.frame_width, config.frame_height, fps)
        .context("failed to open output video")?;

    let mut tracker = PerformanceTracker::new();
    let summary = process(source.as_mut(), &mut sink, &mut tracker, config, fps, interrupt);

    // The output container is finalized on every exit path; an encoder that
    // cannot finalize leaves a truncated file, which is fatal.
    sink.finish().context("failed to finalize output video")?;

    info!(output = %config.output.display(), "video saved");
    tracker.summarize();

    Ok(summary)
}

/// The per-frame loop, generic over source and sink so tests can drive it
/// with in-memory fakes.
fn process(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    tracker: &mut PerformanceTracker,
    config: &PipelineConfig,
    fps: f64,
    interrupt: &AtomicBool,
) -> RunSummary {
    let rectifier = Rectifier::new(TransformParameters::default());
    let layout = InsetLayout::default();
    let total_frames = source.frame_count();
    let target_frame_ms = if fps > 0.0 { 1000.0 / fps } else { f64::INFINITY };

    let run_start = Instant::now();
    let mut frames_read: u64 = 0;
    let mut frames_written: u64 = 0;
    let mut interrupted = false;

    loop {
        // Cooperative cancellation: checked at the top of each iteration,
        // so a pending frame is never half-processed.
        if interrupt.load(Ordering::Relaxed) {
            info!(frames_read, "interrupt received, stopping");
            interrupted = true;
            break;
        }

        let frame_start = Instant::now();
        let Some(mut frame) = source.next_frame() else {
            info!(frames_read, "source exhausted");
            break;
        };
        frames_read += 1;

        if frames_read % PROGRESS_INTERVAL == 0 {
            match total_frames {
                Some(total) if total > 0 => info!(
                    frame = frames_read,
                    total,
                    percent = frames_read * 100 / total,
                    "progress"
                ),
                _ => info!(frame = frames_read, "progress"),
            }
        }

        if frame.image.dimensions() != (config.frame_width, config.frame_height) {
            frame.image = imageops::resize(
                &frame.image,
                config.frame_width,
                config.frame_height,
                FilterType::Triangle,
            );
        }

        let rectify_start = Instant::now();
        let rectified = rectifier.rectify(&frame.image);
        let rectify_ms = rectify_start.elapsed().as_secs_f64() * 1000.0;

        let composite_start = Instant::now();
        composite_inset(&mut frame.image, &rectified, &layout);
        let composite_ms = composite_start.elapsed().as_secs_f64() * 1000.0;

        if let Err(e) = sink.write_frame(&frame.image) {
            // Frame-local: drop this frame and keep the run alive.
            error!(frame = frames_read, error = %e, "failed to write frame, skipping");
            continue;
        }
        frames_written += 1;

        let total_ms = frame_start.elapsed().as_secs_f64() * 1000.0;
        tracker.record_frame(&FrameTiming {
            total_ms,
            rectify_ms,
            composite_ms,
        });

        if total_ms > target_frame_ms {
            warn!(
                frame = frames_read,
                total_ms,
                target_ms = target_frame_ms,
                fps,
                "frame over real-time budget"
            );
        }
    }

    let elapsed_seconds = run_start.elapsed().as_secs_f64();
    let average_fps = if elapsed_seconds > 0.0 {
        frames_written as f64 / elapsed_seconds
    } else {
        0.0
    };
    info!(
        frames = frames_written,
        elapsed_seconds, average_fps, "processing completed"
    );

    RunSummary {
        frames_processed: frames_written,
        elapsed_seconds,
        interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use anyhow::bail;
    use image::{Rgb, RgbImage};
    use tracing_test::traced_test;

    use crate::video::frame::Frame;

    fn test_config(width: u32, height: u32, fps: f64) -> PipelineConfig {
        PipelineConfig {
            source: SourceSpec::Images(PathBuf::from("unused")),
            output: PathBuf::from("unused.mp4"),
            frame_width: width,
            frame_height: height,
            fps,
        }
    }

    /// Yields `total` synthetic frames, optionally raising the interrupt
    /// flag after a given number of frames has been handed out.
    struct FakeSource {
        total: u64,
        produced: u64,
        width: u32,
        height: u32,
        interrupt_after: Option<(u64, Arc<AtomicBool>)>,
    }

    impl FakeSource {
        fn new(total: u64, width: u32, height: u32) -> Self {
            Self {
                total,
                produced: 0,
                width,
                height,
                interrupt_after: None,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn frame_count(&self) -> Option<u64> {
            Some(self.total)
        }

        fn fps(&self) -> Option<f64> {
            None
        }

        fn next_frame(&mut self) -> Option<Frame> {
            if self.produced >= self.total {
                return None;
            }
            let frame_number = self.produced;
            self.produced += 1;
            if let Some((after, flag)) = &self.interrupt_after {
                if self.produced >= *after {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            Some(Frame {
                image: RgbImage::from_pixel(self.width, self.height, Rgb([60, 60, 60])),
                frame_number,
                timestamp_seconds: 0.0,
            })
        }
    }

    /// Collects written frame dimensions, optionally failing one write.
    struct FakeSink {
        frames: Vec<(u32, u32)>,
        attempts: usize,
        fail_on_attempt: Option<usize>,
    }

    impl FakeSink {
        fn new() -> Self {
            Self {
                frames: Vec::new(),
                attempts: 0,
                fail_on_attempt: None,
            }
        }
    }

    impl FrameSink for FakeSink {
        fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
            self.attempts += 1;
            if self.fail_on_attempt == Some(self.attempts) {
                bail!("simulated write failure");
            }
            self.frames.push(image.dimensions());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn three_frames_in_three_frames_out() {
        let config = test_config(128, 80, 1.0);
        let mut source = FakeSource::new(3, 64, 64);
        let mut sink = FakeSink::new();
        let mut tracker = PerformanceTracker::new();
        let interrupt = AtomicBool::new(false);

        let summary = process(&mut source, &mut sink, &mut tracker, &config, 1.0, &interrupt);

        assert_eq!(summary.frames_processed, 3);
        assert!(!summary.interrupted);
        // Frames are resized to the configured output dimensions.
        assert_eq!(sink.frames, vec![(128, 80); 3]);
        assert_eq!(tracker.frame_count(), 3);
        assert!(logs_contain("processing completed"));
        // At 1 fps the per-frame budget is a full second; tiny frames
        // never exceed it.
        assert!(!logs_contain("over real-time budget"));
    }

    #[test]
    fn write_failure_skips_frame_without_corrupting_accounting() {
        let config = test_config(64, 48, 30.0);
        let mut source = FakeSource::new(10, 64, 48);
        let mut sink = FakeSink::new();
        sink.fail_on_attempt = Some(5);
        let mut tracker = PerformanceTracker::new();
        let interrupt = AtomicBool::new(false);

        let summary = process(&mut source, &mut sink, &mut tracker, &config, 30.0, &interrupt);

        assert_eq!(summary.frames_processed, 9);
        assert_eq!(sink.frames.len(), 9);
        assert_eq!(tracker.frame_count(), 9);
    }

    #[test]
    fn unreadable_source_file_skips_frame_without_corrupting_accounting() {
        // A real image-sequence source with one corrupt file among ten:
        // the frame never reaches the stages, the sink gets nine frames.
        let dir = tempfile::TempDir::new().unwrap();
        for i in 0..10 {
            let path = dir.path().join(format!("frame_{i:03}.png"));
            if i == 4 {
                std::fs::write(&path, "corrupt").unwrap();
            } else {
                RgbImage::from_pixel(8, 8, Rgb([i as u8 * 20, 0, 0]))
                    .save(&path)
                    .unwrap();
            }
        }

        let config = test_config(64, 48, 30.0);
        let mut source = ImageSequenceSource::open(dir.path(), config.fps).unwrap();
        let mut sink = FakeSink::new();
        let mut tracker = PerformanceTracker::new();
        let interrupt = AtomicBool::new(false);

        let summary = process(&mut source, &mut sink, &mut tracker, &config, 30.0, &interrupt);

        assert_eq!(summary.frames_processed, 9);
        assert_eq!(sink.frames.len(), 9);
        assert_eq!(tracker.frame_count(), 9);
    }

    #[test]
    fn interrupt_stops_before_next_frame_is_read() {
        let config = test_config(64, 48, 30.0);
        let flag = Arc::new(AtomicBool::new(false));
        let mut source = FakeSource::new(10, 64, 48);
        source.interrupt_after = Some((2, Arc::clone(&flag)));
        let mut sink = FakeSink::new();
        let mut tracker = PerformanceTracker::new();

        let summary = process(&mut source, &mut sink, &mut tracker, &config, 30.0, &flag);

        assert!(summary.interrupted);
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(tracker.frame_count(), 2);
        // Frame 3 was never pulled from the source.
        assert_eq!(source.produced, 2);
    }

    #[test]
    fn empty_source_processes_nothing() {
        let config = test_config(64, 48, 30.0);
        let mut source = FakeSource::new(0, 64, 48);
        let mut sink = FakeSink::new();
        let mut tracker = PerformanceTracker::new();
        let interrupt = AtomicBool::new(false);

        let summary = process(&mut source, &mut sink, &mut tracker, &config, 30.0, &interrupt);

        assert_eq!(summary.frames_processed, 0);
        assert!(sink.frames.is_empty());
        assert_eq!(tracker.frame_count(), 0);
    }

    #[test]
    fn full_run_over_images_produces_output_video() {
        if !crate::video::encoder::is_ffmpeg_available() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }

        let dir = tempfile::TempDir::new().unwrap();
        for i in 0..3 {
            RgbImage::from_pixel(32, 32, Rgb([0, i as u8 * 50, 0]))
                .save(dir.path().join(format!("{i:02}.png")))
                .unwrap();
        }
        let out_dir = tempfile::TempDir::new().unwrap();
        let output = out_dir.path().join("out.mp4");

        let config = PipelineConfig {
            source: SourceSpec::Images(dir.path().to_path_buf()),
            output: output.clone(),
            frame_width: 64,
            frame_height: 48,
            fps: 30.0,
        };
        let interrupt = AtomicBool::new(false);
        let summary = run_pipeline(&config, &interrupt).unwrap();

        assert_eq!(summary.frames_processed, 3);
        assert!(output.exists());

        let mut decoder = crate::video::decoder::VideoDecoder::open(&output).unwrap();
        assert_eq!(decoder.width(), 64);
        assert_eq!(decoder.height(), 48);
        let mut decoded = 0;
        while let Some(frame) = decoder.next_frame().unwrap() {
            assert_eq!(frame.image.dimensions(), (64, 48));
            decoded += 1;
        }
        assert_eq!(decoded, 3);
    }

    #[test]
    fn missing_input_directory_is_fatal() {
        let config = PipelineConfig {
            source: SourceSpec::Images(Path::new("/nonexistent/birdseye-input").to_path_buf()),
            output: PathBuf::from("unused.mp4"),
            frame_width: 64,
            frame_height: 48,
            fps: 30.0,
        };
        let interrupt = AtomicBool::new(false);
        assert!(run_pipeline(&config, &interrupt).is_err());
    }
}
