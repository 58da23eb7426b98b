//! Multi-pass effect rendering.
//!
//! Planning ([`plan`]), aspect correction ([`aspect`]) and uniform caching
//! ([`params`]) are GPU-free. [`graph::RenderGraph`] owns the wgpu objects and
//! executes a plan against a screen view.

pub mod aspect;
pub mod gpu_context;
pub mod graph;
pub mod params;
pub mod plan;
pub mod program;
pub mod targets;

pub use gpu_context::GpuContext;
pub use graph::RenderGraph;

use crate::effects::EffectId;
use std::fmt;

/// One effect to apply this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectDraw {
    pub id: EffectId,
    /// Rendering intensity: transition envelope times the user's slider.
    pub intensity: f32,
}

/// Per-frame values shared by every program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGlobals {
    /// Seconds since the driving loop started.
    pub time: f32,
    pub bpm: f32,
}

/// Identity of a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramId {
    /// Reads the video texture with aspect-corrected coordinates.
    VideoSample,
    /// Copies a render target to the screen.
    Passthrough,
    Effect(EffectId),
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramId::VideoSample => f.write_str("video-sample"),
            ProgramId::Passthrough => f.write_str("passthrough"),
            ProgramId::Effect(id) => write!(f, "effect:{}", id),
        }
    }
}
