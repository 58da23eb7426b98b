//! Uniform upload cache.
//!
//! Tracks the last value uploaded for each `(program, uniform)` pair and the
//! last program bound. Binding a different program drops that program's
//! cached values so everything it reads is uploaded again. Skipping an
//! upload never changes what gets drawn.

use super::ProgramId;
use std::collections::HashMap;

/// Dynamic per-frame uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    Time,
    Tempo,
    Intensity,
}

impl Uniform {
    /// Byte offset inside [`super::program::EffectUniforms`].
    pub fn offset(self) -> u64 {
        match self {
            Uniform::Time => 0,
            Uniform::Tempo => 4,
            Uniform::Intensity => 8,
        }
    }
}

/// A value that must reach the GPU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformWrite {
    pub uniform: Uniform,
    pub value: f32,
}

/// Counters for observing cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    pub uploads: u64,
    pub skipped: u64,
}

#[derive(Debug, Default)]
pub struct ParameterBridge {
    enabled: bool,
    bound: Option<ProgramId>,
    last: HashMap<(ProgramId, Uniform), u32>,
    stats: BridgeStats,
}

impl ParameterBridge {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// A bridge that uploads every value on every draw.
    pub fn uncached() -> Self {
        Self::default()
    }

    /// Marks `program` as bound. Returns whether this switched programs.
    pub fn bind(&mut self, program: ProgramId) -> bool {
        if self.bound == Some(program) {
            return false;
        }
        self.bound = Some(program);
        self.last.retain(|(owner, _), _| *owner != program);
        true
    }

    /// Filters `values` down to the uniforms of `program` that need an
    /// upload, recording them as uploaded. Call after [`Self::bind`].
    pub fn prepare(&mut self, program: ProgramId, values: &[(Uniform, f32)]) -> Vec<UniformWrite> {
        let mut writes = Vec::with_capacity(values.len());
        for &(uniform, value) in values {
            let bits = value.to_bits();
            if self.enabled && self.last.get(&(program, uniform)) == Some(&bits) {
                self.stats.skipped += 1;
                continue;
            }
            self.last.insert((program, uniform), bits);
            self.stats.uploads += 1;
            writes.push(UniformWrite { uniform, value });
        }
        writes
    }

    /// Binds `program` and prepares its values in one step. Programs without
    /// dynamic uniforms still pass through here so the switch is recorded.
    pub fn stage(&mut self, program: ProgramId, values: &[(Uniform, f32)]) -> Vec<UniformWrite> {
        self.bind(program);
        self.prepare(program, values)
    }

    /// Forgets everything, e.g. after GPU buffers were recreated.
    pub fn reset(&mut self) {
        self.bound = None;
        self.last.clear();
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectId;

    const WAVE: ProgramId = ProgramId::Effect(EffectId::Wave);
    const SEPIA: ProgramId = ProgramId::Effect(EffectId::Sepia);

    fn uniforms(time: f32, intensity: f32) -> [(Uniform, f32); 3] {
        [
            (Uniform::Time, time),
            (Uniform::Tempo, 120.0),
            (Uniform::Intensity, intensity),
        ]
    }

    #[test]
    fn unchanged_values_are_skipped_while_bound() {
        let mut bridge = ParameterBridge::new();
        assert!(bridge.bind(WAVE));
        assert_eq!(bridge.prepare(WAVE, &uniforms(1.0, 0.5)).len(), 3);

        assert!(!bridge.bind(WAVE));
        let writes = bridge.prepare(WAVE, &uniforms(2.0, 0.5));
        assert_eq!(
            writes,
            vec![UniformWrite { uniform: Uniform::Time, value: 2.0 }]
        );
        assert_eq!(bridge.stats(), BridgeStats { uploads: 4, skipped: 2 });
    }

    #[test]
    fn program_switch_forces_full_upload() {
        let mut bridge = ParameterBridge::new();
        bridge.bind(WAVE);
        bridge.prepare(WAVE, &uniforms(1.0, 0.5));
        bridge.bind(SEPIA);
        bridge.prepare(SEPIA, &uniforms(1.0, 1.0));

        assert!(bridge.bind(WAVE));
        assert_eq!(bridge.prepare(WAVE, &uniforms(1.0, 0.5)).len(), 3);
    }

    #[test]
    fn uniformless_passes_are_recorded_as_binds() {
        let mut bridge = ParameterBridge::new();
        assert!(bridge.stage(ProgramId::VideoSample, &[]).is_empty());
        assert_eq!(bridge.stage(WAVE, &uniforms(1.0, 0.5)).len(), 3);
        assert!(bridge.stage(ProgramId::Passthrough, &[]).is_empty());

        // Next frame: the video pass sits between two Wave draws.
        bridge.stage(ProgramId::VideoSample, &[]);
        assert!(bridge.bind(WAVE));
        assert_eq!(bridge.prepare(WAVE, &uniforms(1.0, 0.5)).len(), 3);
    }

    #[test]
    fn cached_and_uncached_bridges_leave_the_same_values() {
        let frames: [&[(ProgramId, f32, f32)]; 4] = [
            &[(WAVE, 0.0, 0.5), (SEPIA, 0.0, 1.0)],
            &[(WAVE, 0.0, 0.5), (SEPIA, 0.0, 1.0)],
            &[(WAVE, 0.1, 0.5), (WAVE, 0.1, 0.7), (SEPIA, 0.1, 1.0)],
            &[(SEPIA, 0.2, 0.3), (SEPIA, 0.2, 0.3), (WAVE, 0.2, 0.7)],
        ];

        let replay = |mut bridge: ParameterBridge| {
            let mut gpu = HashMap::new();
            for frame in frames {
                bridge.stage(ProgramId::VideoSample, &[]);
                for &(program, time, intensity) in frame {
                    for write in bridge.stage(program, &uniforms(time, intensity)) {
                        gpu.insert((program, write.uniform), write.value);
                    }
                }
                bridge.stage(ProgramId::Passthrough, &[]);
            }
            (gpu, bridge.stats())
        };

        let (cached, cached_stats) = replay(ParameterBridge::new());
        let (uncached, uncached_stats) = replay(ParameterBridge::uncached());
        assert_eq!(cached, uncached);
        assert_eq!(cached[&(WAVE, Uniform::Intensity)], 0.7);
        assert_eq!(cached[&(SEPIA, Uniform::Time)], 0.2);
        assert!(cached_stats.skipped > 0);
        assert_eq!(uncached_stats.skipped, 0);
    }

    #[test]
    fn uncached_bridge_uploads_everything() {
        let mut bridge = ParameterBridge::uncached();
        bridge.bind(WAVE);
        bridge.prepare(WAVE, &uniforms(1.0, 0.5));
        bridge.bind(WAVE);
        assert_eq!(bridge.prepare(WAVE, &uniforms(1.0, 0.5)).len(), 3);
    }
}
