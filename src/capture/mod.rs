//! Video sources the driving loop pulls frames from.

mod nokhwa_backend;
mod threaded;

pub use nokhwa_backend::NokhwaCapture;
pub use threaded::AsyncCapture;

use crate::frame::VideoFrame;
use anyhow::Result;
use std::time::Instant;

/// A source of video frames polled once per tick.
///
/// `latest_frame` never blocks. It returns `None` when no frame newer than
/// the previously returned one is ready, so the caller can skip drawing.
pub trait FrameSource {
    fn latest_frame(&mut self, now: Instant) -> Option<VideoFrame>;

    /// Frame size as far as it is known, `(0, 0)` before the first frame.
    fn natural_size(&self) -> (u32, u32);

    /// True once no further frame will ever arrive.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Blocking camera access, driven from a capture thread.
pub trait CaptureBackend {
    fn list_devices() -> Result<Vec<CameraInfo>>
    where
        Self: Sized;

    fn open(config: &CaptureConfig) -> Result<Self>
    where
        Self: Sized;

    /// Waits for and decodes the next frame.
    fn capture_frame(&mut self) -> Result<VideoFrame>;

    fn frame_size(&self) -> (u32, u32);
}

#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
}

/// Requested camera mode. The device may pick the closest one it supports.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}
