//! Pass planning for one frame.
//!
//! With no effects the video goes straight to the screen. Otherwise it is
//! baked into target 0, each effect reads the last written target and writes
//! the other one, and a passthrough copies the final target to the screen.

use super::{EffectDraw, ProgramId};

/// Where a pass reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassSource {
    Video,
    Target(usize),
}

/// Where a pass writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    Target(usize),
    Screen,
}

/// One full-screen draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pass {
    pub program: ProgramId,
    pub source: PassSource,
    pub target: PassTarget,
    /// Rendering intensity for effect passes.
    pub intensity: Option<f32>,
}

/// Two render targets with an explicit "last written" index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingPong {
    written: usize,
}

impl PingPong {
    /// Target holding the most recent output.
    pub fn read(&self) -> usize {
        self.written
    }

    /// Target the next pass must write.
    pub fn write(&self) -> usize {
        1 - self.written
    }

    pub fn flip(&mut self) {
        self.written = self.write();
    }
}

/// Builds the pass list for `draws`, which must already be in registry order.
pub fn plan_passes(draws: &[EffectDraw]) -> Vec<Pass> {
    if draws.is_empty() {
        return vec![Pass {
            program: ProgramId::VideoSample,
            source: PassSource::Video,
            target: PassTarget::Screen,
            intensity: None,
        }];
    }

    let mut passes = Vec::with_capacity(draws.len() + 2);
    let mut ping_pong = PingPong::default();

    passes.push(Pass {
        program: ProgramId::VideoSample,
        source: PassSource::Video,
        target: PassTarget::Target(ping_pong.read()),
        intensity: None,
    });

    for draw in draws {
        passes.push(Pass {
            program: ProgramId::Effect(draw.id),
            source: PassSource::Target(ping_pong.read()),
            target: PassTarget::Target(ping_pong.write()),
            intensity: Some(draw.intensity),
        });
        ping_pong.flip();
    }

    passes.push(Pass {
        program: ProgramId::Passthrough,
        source: PassSource::Target(ping_pong.read()),
        target: PassTarget::Screen,
        intensity: None,
    });

    passes
}
