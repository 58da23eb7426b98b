use crate::capture::FrameSource;
use crate::frame::{PixelFormat, VideoFrame};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// A single picture used as the video source. Yields its frame once.
pub struct StillImage {
    frame: VideoFrame,
    delivered: bool,
}

impl StillImage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to load image {}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        info!("Image {}: {}x{}", path.display(), width, height);
        Ok(Self::from_frame(VideoFrame::from_data(
            width,
            height,
            PixelFormat::Rgba,
            image.into_raw(),
        )))
    }

    pub fn from_frame(frame: VideoFrame) -> Self {
        Self {
            frame,
            delivered: false,
        }
    }
}

impl FrameSource for StillImage {
    fn latest_frame(&mut self, _now: Instant) -> Option<VideoFrame> {
        if self.delivered {
            return None;
        }
        self.delivered = true;
        Some(self.frame.clone())
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn is_exhausted(&self) -> bool {
        self.delivered
    }
}
