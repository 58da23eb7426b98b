//! ShaderDeck: live shader effects over camera, video or still sources.
//!
//! User toggles go through [`controls::EffectDeck`], which debounces them
//! and starts eased fades in the [`transition`] engine. Each tick the
//! [`driver::DrivingLoop`] advances those fades and hands the resulting
//! draw list to a [`driver::FrameRenderer`], normally the wgpu
//! [`render::RenderGraph`] behind an [`output::WindowCanvas`].

pub mod capture;
pub mod config;
pub mod controls;
pub mod driver;
pub mod effects;
pub mod error;
pub mod frame;
pub mod output;
pub mod perf;
pub mod render;
pub mod transition;
pub mod video;
