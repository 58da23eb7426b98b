//! User intent: on/off flags, slider values and tempo.
//!
//! Controllers (keyboard, config reloads) talk to an [`EffectDeck`]. The deck
//! keeps the user's logical on/off flag separate from the transition
//! engine's `is_active`, and only couples them through `start_transition`.

use crate::config::EffectSetting;
use crate::effects::{EffectId, EffectMap};
use crate::render::EffectDraw;
use crate::transition::{TransitionEngine, TransitionTable};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default window in which repeated toggles of one effect are dropped.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

pub const DEFAULT_BPM: f32 = 120.0;

/// Per-effect gate that absorbs duplicate toggle events.
#[derive(Debug, Clone)]
pub struct ToggleDebouncer {
    window: Duration,
    last_accepted: EffectMap<Option<Instant>>,
}

impl ToggleDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: EffectMap::default(),
        }
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Returns `true` and records `now` if the toggle should go through.
    pub fn accept(&mut self, id: EffectId, now: Instant) -> bool {
        let last = self.last_accepted.get_mut(id);
        if let Some(previous) = *last {
            if now.saturating_duration_since(previous) < self.window {
                return false;
            }
        }
        *last = Some(now);
        true
    }
}

/// The user's view of the effect set, driving a [`TransitionEngine`].
#[derive(Debug, Clone)]
pub struct EffectDeck {
    engine: TransitionEngine,
    debouncer: ToggleDebouncer,
    enabled: EffectMap<bool>,
    intensity: EffectMap<f32>,
    bpm: f32,
    dirty: bool,
}

impl EffectDeck {
    pub fn new(transition: Duration, debounce: Duration) -> Self {
        Self {
            engine: TransitionEngine::new(transition),
            debouncer: ToggleDebouncer::new(debounce),
            enabled: EffectMap::default(),
            intensity: EffectMap::from_fn(|id| id.definition().default_intensity.unwrap_or(1.0)),
            bpm: DEFAULT_BPM,
            dirty: false,
        }
    }

    pub fn set_timing(&mut self, transition: Duration, debounce: Duration) {
        self.engine.set_duration(transition);
        self.debouncer.set_window(debounce);
    }

    /// Flips the on/off flag of `id`. Returns `false` when the request was
    /// debounced.
    pub fn toggle_effect(&mut self, id: EffectId, now: Instant) -> bool {
        if !self.debouncer.accept(id, now) {
            debug!("Dropped duplicate toggle for {}", id);
            return false;
        }

        let enabled = !*self.enabled.get(id);
        self.switch(id, enabled, now);
        true
    }

    /// Declares the on/off state of `id`. Not debounced: the caller states a
    /// desired state rather than reporting a key press. Returns whether the
    /// flag changed.
    pub fn set_enabled(&mut self, id: EffectId, enabled: bool, now: Instant) -> bool {
        if *self.enabled.get(id) == enabled {
            return false;
        }
        self.switch(id, enabled, now);
        true
    }

    fn switch(&mut self, id: EffectId, enabled: bool, now: Instant) {
        *self.enabled.get_mut(id) = enabled;
        info!("{} {}", id, if enabled { "on" } else { "off" });
        let target = if enabled { 1.0 } else { 0.0 };
        self.engine.start_transition(id, target, now);
    }

    /// Sets the slider value for `id`. Applies from the next frame, even
    /// mid-fade. Binary effects have no slider and ignore this.
    pub fn set_intensity(&mut self, id: EffectId, value: f32) {
        if !id.has_intensity() {
            debug!("{} has no intensity control", id);
            return;
        }
        let value = value.clamp(0.0, 1.0);
        let slot = self.intensity.get_mut(id);
        if *slot != value {
            *slot = value;
            self.dirty = true;
        }
    }

    pub fn nudge_intensity(&mut self, id: EffectId, delta: f32) {
        let value = *self.intensity.get(id) + delta;
        self.set_intensity(id, value);
    }

    pub fn is_enabled(&self, id: EffectId) -> bool {
        *self.enabled.get(id)
    }

    pub fn intensity(&self, id: EffectId) -> f32 {
        *self.intensity.get(id)
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        if self.bpm != bpm {
            self.bpm = bpm;
            self.dirty = true;
        }
    }

    /// Brings the deck to the state described by `settings`. Effects missing
    /// from the list are switched off.
    pub fn apply_settings(&mut self, settings: &[EffectSetting], now: Instant) {
        let mut wanted = EffectMap::<bool>::default();
        for setting in settings {
            *wanted.get_mut(setting.name) = setting.enabled;
            if let Some(value) = setting.intensity {
                self.set_intensity(setting.name, value);
            }
        }
        for (id, enabled) in wanted.iter() {
            self.set_enabled(id, *enabled, now);
        }
    }

    /// Advances transitions to `now`. Returns whether any were in flight.
    pub fn advance(&mut self, now: Instant) -> bool {
        self.engine.advance(now)
    }

    pub fn has_active_transitions(&self) -> bool {
        self.engine.has_active_transitions()
    }

    /// Returns and clears the flag set by slider or tempo changes.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn transitions(&self) -> &TransitionTable {
        self.engine.table()
    }

    /// Effects to draw this frame, in registry order, each with its
    /// rendering intensity (transition envelope times slider value).
    pub fn draw_list(&self) -> Vec<EffectDraw> {
        self.engine
            .table()
            .active()
            .map(|(id, envelope)| EffectDraw {
                id,
                intensity: envelope * self.user_intensity(id),
            })
            .collect()
    }

    fn user_intensity(&self, id: EffectId) -> f32 {
        if id.has_intensity() {
            *self.intensity.get(id)
        } else {
            1.0
        }
    }
}

impl Default for EffectDeck {
    fn default() -> Self {
        Self::new(crate::transition::DEFAULT_TRANSITION, DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Phase;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn debounce_is_per_effect() {
        let t0 = Instant::now();
        let mut gate = ToggleDebouncer::new(DEFAULT_DEBOUNCE);
        assert!(gate.accept(EffectId::Wave, t0));
        assert!(!gate.accept(EffectId::Wave, t0 + ms(10)));
        assert!(gate.accept(EffectId::Swirl, t0 + ms(10)));
        assert!(gate.accept(EffectId::Wave, t0 + ms(60)));
    }

    #[test]
    fn duplicate_toggles_start_one_transition() {
        let t0 = Instant::now();
        let mut deck = EffectDeck::default();
        assert!(deck.toggle_effect(EffectId::Wave, t0));
        assert!(!deck.toggle_effect(EffectId::Wave, t0 + ms(10)));
        assert!(deck.is_enabled(EffectId::Wave));
        assert_eq!(deck.transitions().get(EffectId::Wave).phase, Phase::FadingIn);

        assert!(deck.toggle_effect(EffectId::Wave, t0 + ms(60)));
        assert!(!deck.is_enabled(EffectId::Wave));
        assert_eq!(deck.transitions().get(EffectId::Wave).phase, Phase::FadingOut);
    }

    #[test]
    fn slider_scales_the_envelope() {
        let t0 = Instant::now();
        let mut deck = EffectDeck::default();
        deck.set_intensity(EffectId::Grayscale, 0.5);
        deck.toggle_effect(EffectId::Grayscale, t0);
        deck.advance(t0 + ms(150));

        let draws = deck.draw_list();
        assert_eq!(draws.len(), 1);
        let envelope = deck.transitions().get(EffectId::Grayscale).current;
        assert!((draws[0].intensity - envelope * 0.5).abs() < 1e-6);

        deck.set_intensity(EffectId::Grayscale, 1.0);
        assert!(deck.take_dirty());
        assert!((deck.draw_list()[0].intensity - envelope).abs() < 1e-6);
    }

    #[test]
    fn binary_effects_render_at_full_strength() {
        let t0 = Instant::now();
        let mut deck = EffectDeck::default();
        deck.set_intensity(EffectId::Invert, 0.2);
        deck.toggle_effect(EffectId::Invert, t0);
        let draws = deck.draw_list();
        assert_eq!(draws, vec![EffectDraw { id: EffectId::Invert, intensity: 1.0 }]);
        assert!(!deck.take_dirty());
    }

    #[test]
    fn settings_switch_off_unlisted_effects() {
        let t0 = Instant::now();
        let mut deck = EffectDeck::new(Duration::ZERO, DEFAULT_DEBOUNCE);
        deck.toggle_effect(EffectId::Mirror, t0);
        deck.toggle_effect(EffectId::Sepia, t0);

        let settings = vec![EffectSetting {
            name: EffectId::Sepia,
            enabled: true,
            intensity: Some(0.25),
        }];
        deck.apply_settings(&settings, t0 + ms(100));
        deck.advance(t0 + ms(100));

        assert!(!deck.is_enabled(EffectId::Mirror));
        assert!(deck.is_enabled(EffectId::Sepia));
        assert_eq!(deck.intensity(EffectId::Sepia), 0.25);
        let ids: Vec<_> = deck.draw_list().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![EffectId::Sepia]);
    }

    #[test]
    fn settings_right_after_a_toggle_still_apply() {
        let t0 = Instant::now();
        let mut deck = EffectDeck::default();
        assert!(deck.toggle_effect(EffectId::Wave, t0));

        let settings = vec![EffectSetting {
            name: EffectId::Wave,
            enabled: false,
            intensity: None,
        }];
        deck.apply_settings(&settings, t0 + ms(10));
        assert!(!deck.is_enabled(EffectId::Wave));

        deck.advance(t0 + Duration::from_secs(5));
        assert!(deck.draw_list().is_empty());

        // The keyboard path is still debounced against the earlier press.
        assert!(!deck.toggle_effect(EffectId::Wave, t0 + ms(20)));
        assert!(!deck.is_enabled(EffectId::Wave));
    }

    #[test]
    fn intensity_is_clamped() {
        let mut deck = EffectDeck::default();
        deck.nudge_intensity(EffectId::Wave, 5.0);
        assert_eq!(deck.intensity(EffectId::Wave), 1.0);
        deck.nudge_intensity(EffectId::Wave, -5.0);
        assert_eq!(deck.intensity(EffectId::Wave), 0.0);
    }
}
