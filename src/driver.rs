//! Per-tick orchestration: pull a frame, advance transitions, draw, report.

use crate::capture::FrameSource;
use crate::controls::EffectDeck;
use crate::frame::VideoFrame;
use crate::perf::PerfReporter;
use crate::render::{EffectDraw, FrameGlobals};
use anyhow::Result;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Something that can draw a frame through an effect chain.
pub trait FrameRenderer {
    fn render(&mut self, frame: &VideoFrame, draws: &[EffectDraw], globals: FrameGlobals) -> Result<()>;

    /// Frees every GPU object. Called once when the loop stops.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was drawn.
    Drawn,
    /// No frame has arrived yet.
    Skipped,
    /// Nothing changed since the last draw.
    Idle,
    /// The loop is not running.
    Stopped,
}

pub struct DrivingLoop<R: FrameRenderer> {
    renderer: R,
    source: Option<Box<dyn FrameSource>>,
    reporter: PerfReporter,
    epoch: Option<Instant>,
    last_frame: Option<VideoFrame>,
    needs_redraw: bool,
    released: bool,
}

impl<R: FrameRenderer> DrivingLoop<R> {
    pub fn new(renderer: R, source: Box<dyn FrameSource>, reporter: PerfReporter) -> Self {
        Self {
            renderer,
            source: Some(source),
            reporter,
            epoch: None,
            last_frame: None,
            needs_redraw: false,
            released: false,
        }
    }

    /// Starts ticking. `now` is time zero for the shaders' clock.
    pub fn start(&mut self, now: Instant) {
        if self.source.is_none() || self.epoch.is_some() {
            return;
        }
        info!("Driving loop started");
        self.epoch = Some(now);
        self.needs_redraw = true;
    }

    /// Detaches the frame source and releases the renderer's GPU resources.
    /// The loop cannot be restarted afterwards.
    pub fn stop(&mut self) {
        if self.released {
            return;
        }
        info!("Driving loop stopped");
        self.epoch = None;
        self.source = None;
        self.last_frame = None;
        self.renderer.release();
        self.released = true;
    }

    pub fn is_running(&self) -> bool {
        self.epoch.is_some()
    }

    /// Forces the next tick to draw, e.g. after the canvas was resized.
    pub fn invalidate(&mut self) {
        self.needs_redraw = true;
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn reporter_mut(&mut self) -> &mut PerfReporter {
        &mut self.reporter
    }

    /// True when nothing can change until the deck or the canvas does: no
    /// redraw is pending and the source will not deliver again.
    pub fn is_settled(&self) -> bool {
        !self.needs_redraw && self.source.as_ref().is_some_and(|s| s.is_exhausted())
    }

    /// Natural size of the attached source, if any.
    pub fn source_size(&self) -> Option<(u32, u32)> {
        self.source.as_ref().map(|s| s.natural_size())
    }

    pub fn tick(&mut self, deck: &mut EffectDeck, now: Instant) -> TickOutcome {
        let (Some(epoch), Some(source)) = (self.epoch, self.source.as_mut()) else {
            return TickOutcome::Stopped;
        };

        let fresh = source.latest_frame(now);
        let has_fresh = fresh.is_some();
        if let Some(frame) = fresh {
            self.last_frame = Some(frame);
        }
        let Some(frame) = self.last_frame.as_ref() else {
            trace!("No video frame ready yet");
            return TickOutcome::Skipped;
        };

        let animating = deck.advance(now);
        let dirty = deck.take_dirty();
        let draws = deck.draw_list();

        // Effects animate with time, so any active one keeps the loop drawing.
        let changed = has_fresh || animating || dirty || !draws.is_empty();
        if !changed && !self.needs_redraw {
            return TickOutcome::Idle;
        }

        let globals = FrameGlobals {
            time: now.duration_since(epoch).as_secs_f32(),
            bpm: deck.bpm(),
        };

        let draw_start = Instant::now();
        if let Err(e) = self.renderer.render(frame, &draws, globals) {
            warn!("Frame render failed: {:#}", e);
            return TickOutcome::Skipped;
        }
        self.needs_redraw = false;
        debug!(
            "Drew {} effect(s) in {:.2} ms",
            draws.len(),
            draw_start.elapsed().as_secs_f32() * 1000.0
        );
        self.reporter.record(now, draw_start.elapsed());
        TickOutcome::Drawn
    }
}

impl<R: FrameRenderer> Drop for DrivingLoop<R> {
    fn drop(&mut self) {
        self.stop();
    }
}
