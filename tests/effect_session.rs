//! Toggle-to-draw scenarios through the public API, with a recording
//! renderer standing in for the GPU.

use anyhow::Result;
use shaderdeck::capture::FrameSource;
use shaderdeck::controls::EffectDeck;
use shaderdeck::driver::{DrivingLoop, FrameRenderer, TickOutcome};
use shaderdeck::effects::EffectId;
use shaderdeck::frame::{PixelFormat, VideoFrame};
use shaderdeck::perf::PerfReporter;
use shaderdeck::render::plan::{plan_passes, PassTarget};
use shaderdeck::render::{EffectDraw, FrameGlobals, ProgramId};
use shaderdeck::transition::{ease_in_out_cubic, Phase};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Recording {
    frames: Vec<(Vec<EffectDraw>, FrameGlobals)>,
    released: bool,
}

struct RecordingRenderer(Rc<RefCell<Recording>>);

impl FrameRenderer for RecordingRenderer {
    fn render(&mut self, _frame: &VideoFrame, draws: &[EffectDraw], globals: FrameGlobals) -> Result<()> {
        self.0.borrow_mut().frames.push((draws.to_vec(), globals));
        Ok(())
    }

    fn release(&mut self) {
        self.0.borrow_mut().released = true;
    }
}

/// Delivers a new frame on every poll, like a camera faster than the tick.
struct Camera;

impl FrameSource for Camera {
    fn latest_frame(&mut self, _now: Instant) -> Option<VideoFrame> {
        Some(VideoFrame::new(16, 9, PixelFormat::Rgb))
    }

    fn natural_size(&self) -> (u32, u32) {
        (16, 9)
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn fade_in_reaches_full_intensity_at_transition_end() {
    let t0 = Instant::now();
    let mut deck = EffectDeck::default();
    let id = EffectId::Grayscale;
    assert_eq!(id.definition().default_intensity, Some(1.0));

    assert!(deck.toggle_effect(id, t0));
    let state = *deck.transitions().get(id);
    assert!(state.is_active);
    assert_eq!(state.phase, Phase::FadingIn);

    deck.advance(t0 + ms(150));
    let mid = deck.transitions().get(id).current;
    assert!(mid > 0.0 && mid < 1.0);
    assert!((mid - ease_in_out_cubic(0.5)).abs() < 0.05);

    deck.advance(t0 + ms(300));
    let end = deck.transitions().get(id);
    assert_eq!(end.current, 1.0);
    assert_eq!(end.phase, Phase::Idle);
}

#[test]
fn driving_loop_draws_the_advanced_state_every_tick() {
    let log = Rc::new(RefCell::new(Recording::default()));
    let mut driver = DrivingLoop::new(
        RecordingRenderer(log.clone()),
        Box::new(Camera),
        PerfReporter::default(),
    );
    let mut deck = EffectDeck::default();
    let t0 = Instant::now();
    driver.start(t0);

    deck.toggle_effect(EffectId::Wave, t0);
    deck.set_intensity(EffectId::Wave, 0.5);
    deck.toggle_effect(EffectId::Invert, t0);

    for step in 0..=20 {
        assert_eq!(driver.tick(&mut deck, t0 + ms(step * 20)), TickOutcome::Drawn);
    }
    driver.stop();

    let log = log.borrow();
    assert!(log.released);

    // Registry order, mapping before color.
    let (last, globals) = &log.frames[20];
    assert_eq!(
        last.iter().map(|d| d.id).collect::<Vec<_>>(),
        vec![EffectId::Wave, EffectId::Invert]
    );
    // Envelope at 1 times the slider.
    assert_eq!(last[0].intensity, 0.5);
    // Binary effects never fade.
    assert!(log.frames.iter().all(|(draws, _)| draws[1].intensity == 1.0));
    assert!((globals.time - 0.4).abs() < 1e-3);

    let wave: Vec<f32> = log.frames.iter().map(|(d, _)| d[0].intensity).collect();
    assert!(wave.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn pass_count_tracks_active_effects() {
    let t0 = Instant::now();
    let mut deck = EffectDeck::default();

    let passes = plan_passes(&deck.draw_list());
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].program, ProgramId::VideoSample);
    assert_eq!(passes[0].target, PassTarget::Screen);

    for id in [EffectId::Sepia, EffectId::Mirror, EffectId::Vignette] {
        deck.toggle_effect(id, t0);
    }
    deck.advance(t0 + ms(300));
    let passes = plan_passes(&deck.draw_list());

    let offscreen = passes
        .iter()
        .filter(|p| matches!(p.target, PassTarget::Target(_)))
        .count();
    assert_eq!(offscreen, 4);
    assert_eq!(passes.last().map(|p| p.target), Some(PassTarget::Screen));
    assert_eq!(
        passes
            .iter()
            .filter_map(|p| match p.program {
                ProgramId::Effect(id) => Some(id),
                _ => None,
            })
            .collect::<Vec<_>>(),
        vec![EffectId::Mirror, EffectId::Sepia, EffectId::Vignette]
    );
}

#[test]
fn rapid_toggles_are_debounced() {
    let t0 = Instant::now();
    let mut deck = EffectDeck::default();

    assert!(deck.toggle_effect(EffectId::Swirl, t0));
    assert!(!deck.toggle_effect(EffectId::Swirl, t0 + ms(10)));
    assert!(deck.is_enabled(EffectId::Swirl));
    assert!(deck.toggle_effect(EffectId::Swirl, t0 + ms(60)));
    assert!(!deck.is_enabled(EffectId::Swirl));
}

#[test]
fn fading_out_keeps_drawing_until_zero() {
    let t0 = Instant::now();
    let mut deck = EffectDeck::default();
    deck.toggle_effect(EffectId::Pixelate, t0);
    deck.advance(t0 + ms(300));

    deck.toggle_effect(EffectId::Pixelate, t0 + ms(400));
    deck.advance(t0 + ms(550));
    assert_eq!(deck.draw_list().len(), 1);
    assert_eq!(deck.transitions().get(EffectId::Pixelate).phase, Phase::FadingOut);

    deck.advance(t0 + ms(700));
    assert!(deck.draw_list().is_empty());
    assert!(!deck.has_active_transitions());
}
