//! Presentation targets.

pub mod window;

pub use window::WindowCanvas;
