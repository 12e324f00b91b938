//! Frame timing for the render loop

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frame timing statistics, in milliseconds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub sample_count: usize,
}

/// Rolling window of frame intervals
///
/// Frames are marked with explicit instants so the host loop and tests
/// share one clock.
#[derive(Debug)]
pub struct FrameProfiler {
    intervals: VecDeque<Duration>,
    max_samples: usize,
    last_frame: Option<Instant>,
    window_start: Option<Instant>,
    frames_in_window: usize,
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new(300)
    }
}

impl FrameProfiler {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            intervals: VecDeque::with_capacity(max_samples),
            max_samples,
            last_frame: None,
            window_start: None,
            frames_in_window: 0,
        }
    }

    /// Record the start of a frame at `now`
    pub fn mark_frame(&mut self, now: Instant) {
        if let Some(last) = self.last_frame {
            self.intervals.push_back(now.saturating_duration_since(last));
            if self.intervals.len() > self.max_samples {
                self.intervals.pop_front();
            }
        }
        self.last_frame = Some(now);
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.frames_in_window += 1;
    }

    pub fn stats(&self) -> FrameStats {
        if self.intervals.is_empty() {
            return FrameStats::default();
        }

        let mut times: Vec<f64> = self.intervals.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        times.sort_by(|a, b| a.total_cmp(b));
        let sum: f64 = times.iter().sum();

        FrameStats {
            avg_ms: sum / times.len() as f64,
            min_ms: times[0],
            max_ms: times[times.len() - 1],
            p50_ms: percentile(&times, 0.50),
            p95_ms: percentile(&times, 0.95),
            p99_ms: percentile(&times, 0.99),
            sample_count: times.len(),
        }
    }

    /// Frames per second over everything marked so far
    pub fn fps(&self) -> f64 {
        match (self.window_start, self.last_frame) {
            (Some(first), Some(last)) if self.frames_in_window > 1 => {
                let secs = last.saturating_duration_since(first).as_secs_f64();
                if secs > 0.0 {
                    (self.frames_in_window - 1) as f64 / secs
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[idx]
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Summary of one `run` invocation
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub effect: String,
    pub target_fps: u32,
    pub fps: f64,
    pub frames_drawn: u64,
    pub control_updates: u64,
    pub frame_stats: FrameStats,
}

impl RunMetrics {
    pub fn log(&self) {
        tracing::info!(
            effect = %self.effect,
            frames = self.frames_drawn,
            control_updates = self.control_updates,
            target_fps = self.target_fps,
            fps = round_to(self.fps, 1),
            avg_ms = round_to(self.frame_stats.avg_ms, 2),
            p95_ms = round_to(self.frame_stats.p95_ms, 2),
            "Run finished"
        );
    }
}
