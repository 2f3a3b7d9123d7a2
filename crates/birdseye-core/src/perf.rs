use std::time::Instant;

use tracing::info;

/// Measured durations for one fully-processed frame, in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct FrameTiming {
    pub total_ms: f64,
    pub rectify_ms: f64,
    pub composite_ms: f64,
}

/// Number of recorded frames between throughput samples.
const FPS_SAMPLE_FRAMES: u64 = 30;

/// Accumulates per-frame timings and reports windowed throughput.
///
/// Only frames that passed the full stage sequence are recorded; skipped
/// frames never show up here.
pub struct PerformanceTracker {
    frame_count: u64,
    total_ms: f64,
    rectify_ms: f64,
    composite_ms: f64,
    fps_anchor: Instant,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            total_ms: 0.0,
            rectify_ms: 0.0,
            composite_ms: 0.0,
            fps_anchor: Instant::now(),
        }
    }

    /// Record one successfully-processed frame.
    ///
    /// Every 30 recorded frames this logs the instantaneous frame rate over
    /// the window plus running averages, then resets the window anchor. The
    /// cumulative sums are kept.
    pub fn record_frame(&mut self, timing: &FrameTiming) {
        self.frame_count += 1;
        self.total_ms += timing.total_ms;
        self.rectify_ms += timing.rectify_ms;
        self.composite_ms += timing.composite_ms;

        if self.frame_count % FPS_SAMPLE_FRAMES == 0 {
            let elapsed_ms = self.fps_anchor.elapsed().as_secs_f64() * 1000.0;
            let fps = if elapsed_ms > 0.0 {
                FPS_SAMPLE_FRAMES as f64 * 1000.0 / elapsed_ms
            } else {
                f64::INFINITY
            };
            let (avg_total_ms, avg_rectify_ms, avg_composite_ms) = self.averages();
            info!(
                fps,
                avg_total_ms,
                avg_rectify_ms,
                avg_composite_ms,
                frames = self.frame_count,
                "throughput sample"
            );
            self.fps_anchor = Instant::now();
        }
    }

    /// Number of recorded frames.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whole-run averages (total, rectify, composite) in milliseconds.
    pub fn averages(&self) -> (f64, f64, f64) {
        if self.frame_count == 0 {
            return (0.0, 0.0, 0.0);
        }
        let n = self.frame_count as f64;
        (
            self.total_ms / n,
            self.rectify_ms / n,
            self.composite_ms / n,
        )
    }

    /// Log the whole-run summary. Emits nothing if no frames were recorded.
    pub fn summarize(&self) {
        if self.frame_count == 0 {
            return;
        }
        let (avg_total_ms, avg_rectify_ms, avg_composite_ms) = self.averages();
        info!(
            frames = self.frame_count,
            avg_total_ms,
            avg_rectify_ms,
            avg_composite_ms,
            "performance summary"
        );
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn timing(total_ms: f64, rectify_ms: f64, composite_ms: f64) -> FrameTiming {
        FrameTiming {
            total_ms,
            rectify_ms,
            composite_ms,
        }
    }

    #[test]
    fn averages_over_recorded_frames() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_frame(&timing(10.0, 4.0, 2.0));
        tracker.record_frame(&timing(20.0, 8.0, 4.0));
        tracker.record_frame(&timing(30.0, 12.0, 6.0));

        assert_eq!(tracker.frame_count(), 3);
        let (total, rectify, composite) = tracker.averages();
        assert!((total - 20.0).abs() < 1e-9);
        assert!((rectify - 8.0).abs() < 1e-9);
        assert!((composite - 4.0).abs() < 1e-9);
    }

    #[test]
    #[traced_test]
    fn summarize_with_zero_frames_emits_nothing() {
        let tracker = PerformanceTracker::new();
        tracker.summarize();
        assert!(!logs_contain("performance summary"));
    }

    #[test]
    #[traced_test]
    fn throughput_sample_every_thirty_frames() {
        let mut tracker = PerformanceTracker::new();
        for _ in 0..29 {
            tracker.record_frame(&timing(1.0, 0.5, 0.2));
        }
        assert!(!logs_contain("throughput sample"));
        tracker.record_frame(&timing(1.0, 0.5, 0.2));
        assert!(logs_contain("throughput sample"));
    }

    #[test]
    #[traced_test]
    fn summarize_reports_whole_run() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_frame(&timing(5.0, 2.0, 1.0));
        tracker.summarize();
        assert!(logs_contain("performance summary"));
    }
}
