use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Width of the window frames-per-second is measured over.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Default minimum spacing between two diagnostics reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// Receives throttled render diagnostics.
pub trait PerformanceObserver {
    fn on_render_performance(&mut self, fps: f32, frame_time_ms: f32);
}

impl<F: FnMut(f32, f32)> PerformanceObserver for F {
    fn on_render_performance(&mut self, fps: f32, frame_time_ms: f32) {
        self(fps, frame_time_ms)
    }
}

/// Observer that only logs.
pub struct LogObserver;

impl PerformanceObserver for LogObserver {
    fn on_render_performance(&mut self, fps: f32, frame_time_ms: f32) {
        debug!("[Perf] Rendering at {:.2} FPS, {:.2} ms per frame", fps, frame_time_ms);
    }
}

/// Counts frames drawn over the trailing [`FPS_WINDOW`].
#[derive(Debug, Default)]
pub struct FpsCounter {
    frames: VecDeque<Instant>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame drawn at `now` and returns the rolling rate.
    pub fn update(&mut self, now: Instant) -> f32 {
        self.frames.push_back(now);
        while let Some(&oldest) = self.frames.front() {
            if now.duration_since(oldest) > FPS_WINDOW {
                self.frames.pop_front();
            } else {
                break;
            }
        }
        self.frames.len() as f32 / FPS_WINDOW.as_secs_f32()
    }
}

/// Feeds an observer at most once per `interval`.
pub struct PerfReporter {
    counter: FpsCounter,
    interval: Duration,
    last_report: Option<Instant>,
    observer: Box<dyn PerformanceObserver>,
}

impl PerfReporter {
    pub fn new(interval: Duration, observer: Box<dyn PerformanceObserver>) -> Self {
        Self {
            counter: FpsCounter::new(),
            interval,
            last_report: None,
            observer,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Records one drawn frame. Returns whether the observer was called.
    pub fn record(&mut self, now: Instant, frame_time: Duration) -> bool {
        let fps = self.counter.update(now);
        let due = self
            .last_report
            .map_or(true, |last| now.duration_since(last) >= self.interval);
        if !due {
            return false;
        }
        self.last_report = Some(now);
        self.observer
            .on_render_performance(fps, frame_time.as_secs_f32() * 1000.0);
        true
    }
}

impl Default for PerfReporter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_INTERVAL, Box::new(LogObserver))
    }
}
