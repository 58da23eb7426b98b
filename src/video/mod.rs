//! File-backed frame sources.

mod ffmpeg;
mod still;

pub use ffmpeg::{probe, VideoInfo, VideoPlayer};
pub use still::StillImage;
