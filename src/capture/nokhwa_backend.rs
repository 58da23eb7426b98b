use super::{CameraInfo, CaptureBackend, CaptureConfig};
use crate::frame::{PixelFormat, VideoFrame};
use anyhow::{anyhow, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use tracing::{debug, info};

/// Webcam capture through nokhwa, decoded to RGB.
pub struct NokhwaCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

/// Modes to try, the requested one first. Built-in macOS cameras usually
/// only speak NV12/YUYV, USB cameras need MJPEG for high resolutions.
fn candidate_formats(config: &CaptureConfig) -> Vec<CameraFormat> {
    let mut modes = vec![(config.width, config.height, config.fps)];
    for mode in [(1920, 1080, 30), (1280, 720, 30), (640, 480, 30)] {
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    }

    modes
        .into_iter()
        .flat_map(|(w, h, fps)| {
            [FrameFormat::NV12, FrameFormat::YUYV, FrameFormat::MJPEG]
                .into_iter()
                .map(move |f| CameraFormat::new(Resolution::new(w, h), f, fps))
        })
        .collect()
}

impl CaptureBackend for NokhwaCapture {
    fn list_devices() -> Result<Vec<CameraInfo>> {
        let devices = nokhwa::query(ApiBackend::Auto)?;
        Ok(devices
            .into_iter()
            .enumerate()
            .map(|(i, d)| CameraInfo {
                index: d.index().as_index().unwrap_or(i as u32),
                name: d.human_name().to_string(),
            })
            .collect())
    }

    fn open(config: &CaptureConfig) -> Result<Self> {
        for format in candidate_formats(config) {
            let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));
            let Ok(mut camera) = Camera::new(CameraIndex::Index(config.device_index), requested) else {
                continue;
            };
            // Some drivers accept the request but fail once streaming.
            if let Err(e) = camera.open_stream() {
                debug!("Camera rejected {:?}: {}", format, e);
                continue;
            }

            let resolution = camera.resolution();
            info!(
                "Camera {} streaming {} ({:?})",
                config.device_index, resolution, format
            );
            return Ok(Self {
                camera,
                width: resolution.width(),
                height: resolution.height(),
            });
        }

        Err(anyhow!(
            "could not open a stream on camera {} in any known format",
            config.device_index
        ))
    }

    fn capture_frame(&mut self) -> Result<VideoFrame> {
        let buffer = self.camera.frame()?;
        let decoded = buffer.decode_image::<RgbFormat>()?;
        let (width, height) = decoded.dimensions();
        if (width, height) != (self.width, self.height) {
            debug!("Camera resolution changed to {}x{}", width, height);
            self.width = width;
            self.height = height;
        }
        Ok(VideoFrame::from_data(width, height, PixelFormat::Rgb, decoded.into_raw()))
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for NokhwaCapture {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            debug!("Failed to stop camera stream: {}", e);
        }
    }
}
