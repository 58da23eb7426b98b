//! Per-effect intensity transitions.
//!
//! Toggling an effect never flips it on or off instantly (unless the effect
//! is binary); instead a short eased fade moves the rendering intensity from
//! wherever it currently is to the new target. [`TransitionTable::advanced`]
//! is a pure function of `(table, now)` so it can be driven by synthetic
//! timestamps.

use crate::effects::{EffectId, EffectMap};
use std::borrow::Cow;
use std::time::{Duration, Instant};

/// Default length of a fade.
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(300);

/// Cubic ease-in-out over `t` in `[0, 1]`.
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FadingIn,
    FadingOut,
}

/// Animation state of one effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    pub phase: Phase,
    /// Intensity used for rendering right now.
    pub current: f32,
    /// Where the running animation is heading.
    pub target: f32,
    /// `current` at the moment the animation started.
    pub start: f32,
    pub start_time: Option<Instant>,
    /// Whether the renderer should draw this effect. Follows `current`, not
    /// the user's on/off flag.
    pub is_active: bool,
}

impl Default for TransitionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            current: 0.0,
            target: 0.0,
            start: 0.0,
            start_time: None,
            is_active: false,
        }
    }
}

impl TransitionState {
    fn advanced(&self, now: Instant, duration: Duration) -> TransitionState {
        if self.phase == Phase::Idle {
            return *self;
        }
        let Some(start_time) = self.start_time else {
            return self.settled(self.target);
        };

        let elapsed = now.saturating_duration_since(start_time);
        let progress = if duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / duration.as_secs_f32()).clamp(0.0, 1.0)
        };

        if progress >= 1.0 {
            return self.settled(self.target);
        }

        let eased = ease_in_out_cubic(progress);
        TransitionState {
            current: self.start + eased * (self.target - self.start),
            ..*self
        }
    }

    fn settled(&self, value: f32) -> TransitionState {
        TransitionState {
            phase: Phase::Idle,
            current: value,
            target: value,
            is_active: value > 0.0,
            ..*self
        }
    }
}

/// Transition state for every registered effect.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionTable {
    states: EffectMap<TransitionState>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EffectId) -> &TransitionState {
        self.states.get(id)
    }

    /// Begins moving `id` towards `target` (clamped to `[0, 1]`).
    ///
    /// Effects with an intensity control fade from their current value, so a
    /// transition that supersedes another in flight never jumps. Binary
    /// effects step straight to the target.
    pub fn start_transition(&mut self, id: EffectId, target: f32, now: Instant) {
        let target = target.clamp(0.0, 1.0);
        let state = self.states.get_mut(id);

        if !id.has_intensity() {
            *state = TransitionState {
                phase: Phase::Idle,
                current: target,
                target,
                start: target,
                start_time: Some(now),
                is_active: target > 0.0,
            };
            return;
        }

        *state = TransitionState {
            phase: if target > 0.0 {
                Phase::FadingIn
            } else {
                Phase::FadingOut
            },
            current: state.current,
            target,
            start: state.current,
            start_time: Some(now),
            // Keep drawing while fading out; `advanced` clears this once the
            // fade lands on zero.
            is_active: true,
        };
    }

    /// Returns the table as of `now`. Borrows `self` unchanged when nothing
    /// is animating.
    pub fn advanced(&self, now: Instant, duration: Duration) -> Cow<'_, TransitionTable> {
        if !self.has_active_transitions() {
            return Cow::Borrowed(self);
        }
        let states = EffectMap::from_fn(|id| self.states.get(id).advanced(now, duration));
        Cow::Owned(TransitionTable { states })
    }

    pub fn has_active_transitions(&self) -> bool {
        self.states.iter().any(|(_, s)| s.phase != Phase::Idle)
    }

    /// Effects that should be drawn, in registry order, with their current
    /// transition intensity.
    pub fn active(&self) -> impl Iterator<Item = (EffectId, f32)> + '_ {
        self.states
            .iter()
            .filter(|(_, s)| s.is_active)
            .map(|(id, s)| (id, s.current))
    }
}

/// Owns the transition table and the fade duration.
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    table: TransitionTable,
    duration: Duration,
}

impl TransitionEngine {
    pub fn new(duration: Duration) -> Self {
        Self {
            table: TransitionTable::new(),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn start_transition(&mut self, id: EffectId, target: f32, now: Instant) {
        self.table.start_transition(id, target, now);
    }

    /// Advances the owned table to `now`. Returns whether any transition was
    /// in flight.
    pub fn advance(&mut self, now: Instant) -> bool {
        match self.table.advanced(now, self.duration) {
            Cow::Borrowed(_) => false,
            Cow::Owned(next) => {
                self.table = next;
                true
            }
        }
    }

    pub fn has_active_transitions(&self) -> bool {
        self.table.has_active_transitions()
    }
}

impl Default for TransitionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSITION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn easing_matches_reference_points() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(0.5), 0.5);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.25) - 0.0625).abs() < 1e-6);
        assert!((ease_in_out_cubic(0.75) - 0.9375).abs() < 1e-6);
    }

    #[test]
    fn fade_in_is_monotonic_and_snaps() {
        let t0 = Instant::now();
        let mut table = TransitionTable::new();
        table.start_transition(EffectId::Wave, 1.0, t0);

        let mut last = 0.0;
        for step in 0..=30 {
            let now = t0 + ms(step * 10);
            let next = table.advanced(now, DEFAULT_TRANSITION);
            let current = next.get(EffectId::Wave).current;
            assert!(current >= last, "step {}: {} < {}", step, current, last);
            last = current;
        }

        let done = table.advanced(t0 + ms(300), DEFAULT_TRANSITION);
        let state = done.get(EffectId::Wave);
        assert_eq!(state.current, 1.0);
        assert_eq!(state.target, 1.0);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.is_active);
    }

    #[test]
    fn fade_out_is_monotonic_and_deactivates() {
        let t0 = Instant::now();
        let mut table = TransitionTable::new();
        table.start_transition(EffectId::Sepia, 1.0, t0);
        let mut table = table.advanced(t0 + ms(300), DEFAULT_TRANSITION).into_owned();

        let t1 = t0 + ms(1000);
        table.start_transition(EffectId::Sepia, 0.0, t1);
        assert_eq!(table.get(EffectId::Sepia).phase, Phase::FadingOut);
        assert!(table.get(EffectId::Sepia).is_active);

        let mut last = 1.0;
        for step in 0..30 {
            let next = table.advanced(t1 + ms(step * 10), DEFAULT_TRANSITION);
            let state = next.get(EffectId::Sepia);
            assert!(state.current <= last);
            assert!(state.is_active, "still drawing mid-fade");
            last = state.current;
        }

        let done = table.advanced(t1 + ms(450), DEFAULT_TRANSITION);
        let state = done.get(EffectId::Sepia);
        assert_eq!(state.current, 0.0);
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.is_active);
    }

    #[test]
    fn restarting_mid_flight_keeps_continuity() {
        let t0 = Instant::now();
        let mut table = TransitionTable::new();
        table.start_transition(EffectId::Swirl, 1.0, t0);

        let mut table = table.advanced(t0 + ms(120), DEFAULT_TRANSITION).into_owned();
        let mid = table.get(EffectId::Swirl).current;
        assert!(mid > 0.0 && mid < 1.0);

        table.start_transition(EffectId::Swirl, 0.0, t0 + ms(120));
        let state = table.get(EffectId::Swirl);
        assert_eq!(state.start, mid);
        assert_eq!(state.current, mid);

        let next = table.advanced(t0 + ms(120), DEFAULT_TRANSITION);
        assert_eq!(next.get(EffectId::Swirl).current, mid);
    }

    #[test]
    fn idle_advance_borrows_input() {
        let table = TransitionTable::new();
        let next = table.advanced(Instant::now(), DEFAULT_TRANSITION);
        assert!(matches!(next, Cow::Borrowed(_)));
        assert_eq!(*next, table);
        assert!(!next.has_active_transitions());
    }

    #[test]
    fn binary_effect_steps_without_animation() {
        let t0 = Instant::now();
        let mut table = TransitionTable::new();
        table.start_transition(EffectId::Invert, 1.0, t0);

        let state = *table.get(EffectId::Invert);
        assert_eq!(state.current, 1.0);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.is_active);
        assert!(!table.has_active_transitions());

        for offset in [0, 50, 150, 1000] {
            let next = table.advanced(t0 + ms(offset), DEFAULT_TRANSITION);
            assert_eq!(*next.get(EffectId::Invert), state);
        }

        table.start_transition(EffectId::Invert, 0.0, t0 + ms(10));
        assert!(!table.get(EffectId::Invert).is_active);
        assert_eq!(table.get(EffectId::Invert).current, 0.0);
    }

    #[test]
    fn active_lists_in_registry_order() {
        let t0 = Instant::now();
        let mut table = TransitionTable::new();
        table.start_transition(EffectId::Vignette, 1.0, t0);
        table.start_transition(EffectId::Mirror, 1.0, t0);
        table.start_transition(EffectId::Wave, 1.0, t0);

        let ids: Vec<_> = table.active().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![EffectId::Mirror, EffectId::Wave, EffectId::Vignette]);
    }

    #[test]
    fn engine_reports_whether_it_was_animating() {
        let t0 = Instant::now();
        let mut engine = TransitionEngine::new(ms(100));
        assert!(!engine.advance(t0));

        engine.start_transition(EffectId::Pixelate, 1.0, t0);
        assert!(engine.advance(t0 + ms(50)));
        assert!(engine.advance(t0 + ms(100)));
        assert!(!engine.has_active_transitions());
        assert!(!engine.advance(t0 + ms(150)));
        assert_eq!(engine.table().get(EffectId::Pixelate).current, 1.0);
    }

    #[test]
    fn zero_duration_completes_on_first_advance() {
        let t0 = Instant::now();
        let mut engine = TransitionEngine::new(Duration::ZERO);
        engine.start_transition(EffectId::Grayscale, 0.7, t0);
        engine.advance(t0);
        let state = engine.table().get(EffectId::Grayscale);
        assert_eq!(state.current, 0.7);
        assert_eq!(state.phase, Phase::Idle);
    }
}
