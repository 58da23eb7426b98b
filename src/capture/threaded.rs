use super::{CaptureBackend, CaptureConfig, FrameSource};
use crate::frame::VideoFrame;
use anyhow::{anyhow, Result};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs a blocking [`CaptureBackend`] on its own thread and hands the newest
/// frame to the render thread without waiting.
///
/// The backend is opened inside the thread, so it does not need to be `Send`.
pub struct AsyncCapture<B> {
    frames: Receiver<VideoFrame>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    size: (u32, u32),
    _backend: PhantomData<fn() -> B>,
}

impl<B: CaptureBackend + 'static> AsyncCapture<B> {
    /// Opens the device and waits until it either streams or fails.
    pub fn open(config: CaptureConfig) -> Result<Self> {
        let (frame_tx, frames) = sync_channel(2);
        let (ready_tx, ready_rx) = sync_channel::<Result<(u32, u32)>>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let worker = std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let mut backend = match B::open(&config) {
                    Ok(backend) => backend,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(backend.frame_size()));

                while !stop_flag.load(Ordering::Relaxed) {
                    match backend.capture_frame() {
                        // A full channel means the renderer is behind; drop the frame.
                        Ok(frame) => match frame_tx.try_send(frame) {
                            Ok(()) | Err(std::sync::mpsc::TrySendError::Full(_)) => {}
                            Err(std::sync::mpsc::TrySendError::Disconnected(_)) => break,
                        },
                        Err(e) => warn!("Camera frame dropped: {}", e),
                    }
                }
                info!("Capture thread exiting");
            })?;

        let size = ready_rx
            .recv()
            .map_err(|_| anyhow!("capture thread exited during startup"))??;

        Ok(Self {
            frames,
            stop,
            worker: Some(worker),
            size,
            _backend: PhantomData,
        })
    }
}

impl<B> FrameSource for AsyncCapture<B> {
    fn latest_frame(&mut self, _now: Instant) -> Option<VideoFrame> {
        let mut newest = None;
        loop {
            match self.frames.try_recv() {
                Ok(frame) => newest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if newest.is_none() && self.worker.is_some() {
                        error!("Capture thread stopped unexpectedly");
                        self.worker = None;
                    }
                    break;
                }
            }
        }
        if let Some(frame) = &newest {
            self.size = (frame.width, frame.height);
        }
        newest
    }

    fn natural_size(&self) -> (u32, u32) {
        self.size
    }
}

impl<B> Drop for AsyncCapture<B> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }
}
