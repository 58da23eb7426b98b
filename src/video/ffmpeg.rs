//! Video file playback through `ffprobe`/`ffmpeg` subprocesses.

use crate::capture::FrameSource;
use crate::frame::{PixelFormat, VideoFrame};
use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const FALLBACK_FPS: f32 = 30.0;

/// Stream properties reported by `ffprobe`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
}

impl VideoInfo {
    fn frame_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps)
    }
}

/// Parses `ffprobe -of default=noprint_wrappers=1` output.
fn parse_probe(output: &str) -> Result<VideoInfo> {
    let mut width = None;
    let mut height = None;
    let mut fps = None;
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "r_frame_rate" => fps = parse_fps(value),
            _ => {}
        }
    }

    match (width, height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(VideoInfo {
            width,
            height,
            fps: fps.unwrap_or(FALLBACK_FPS),
        }),
        _ => Err(anyhow!("ffprobe reported no video stream size:\n{}", output)),
    }
}

/// Parses `30000/1001` or `25` style rates. Zero or garbage yields `None`.
fn parse_fps(value: &str) -> Option<f32> {
    let fps = match value.split_once('/') {
        Some((num, den)) => {
            let num: f32 = num.parse().ok()?;
            let den: f32 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Runs `ffprobe` on `path`.
pub fn probe(path: &Path) -> Result<VideoInfo> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height,r_frame_rate"])
        .args(["-of", "default=noprint_wrappers=1"])
        .arg(path)
        .output()
        .context("failed to run ffprobe")?;

    if !output.status.success() {
        return Err(anyhow!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    parse_probe(&String::from_utf8_lossy(&output.stdout))
}

struct DecodedFrame {
    /// Position on the looping playback timeline.
    pts: Duration,
    data: Vec<u8>,
}

/// Plays a video file in a loop, paced by frame timestamps.
pub struct VideoPlayer {
    info: VideoInfo,
    frames: Receiver<DecodedFrame>,
    pending: Option<DecodedFrame>,
    started: Option<Instant>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl VideoPlayer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe(&path).with_context(|| format!("probing {}", path.display()))?;
        info!(
            "Video {}: {}x{} at {:.2} fps",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        // Bounded so decoding never runs far ahead of playback.
        let (tx, frames) = mpsc::sync_channel(5);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let worker = thread::Builder::new()
            .name("video-decode".into())
            .spawn(move || decode_loop(path, info, tx, stop_flag))?;

        Ok(Self {
            info,
            frames,
            pending: None,
            started: None,
            stop,
            worker: Some(worker),
        })
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }
}

impl FrameSource for VideoPlayer {
    fn latest_frame(&mut self, now: Instant) -> Option<VideoFrame> {
        let started = *self.started.get_or_insert(now);
        let position = now.duration_since(started);

        let mut due = None;
        loop {
            let next = match self.pending.take() {
                Some(frame) => frame,
                None => match self.frames.try_recv() {
                    Ok(frame) => frame,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if self.worker.take().is_some() {
                            error!("Video decoder stopped");
                        }
                        break;
                    }
                },
            };
            if next.pts > position {
                self.pending = Some(next);
                break;
            }
            // Late frames are skipped in favour of the newest due one.
            due = Some(next);
        }

        due.map(|frame| {
            VideoFrame::from_data(self.info.width, self.info.height, PixelFormat::Rgba, frame.data)
                .with_timestamp_us(frame.pts.as_micros() as u64)
        })
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Unblock a sender waiting on the full channel.
        while self.frames.try_recv().is_ok() {}
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Video decode thread panicked");
            }
        }
    }
}

fn spawn_ffmpeg(path: &Path) -> Result<Child> {
    Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn ffmpeg")
}

fn log_stderr(child: &mut Child) {
    let Some(stderr) = child.stderr.take() else {
        return;
    };
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
            warn!("ffmpeg: {}", line);
        }
    });
}

fn decode_loop(path: PathBuf, info: VideoInfo, tx: SyncSender<DecodedFrame>, stop: Arc<AtomicBool>) {
    let frame_bytes = info.width as usize * info.height as usize * 4;
    let frame_duration = info.frame_duration();
    // Keeps counting across loops so timestamps never jump back.
    let mut frame_index: u32 = 0;

    while !stop.load(Ordering::Relaxed) {
        let mut child = match spawn_ffmpeg(&path) {
            Ok(child) => child,
            Err(e) => {
                error!("{:#}", e);
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };
        log_stderr(&mut child);
        let Some(mut stdout) = child.stdout.take() else {
            error!("ffmpeg stdout was not captured");
            return;
        };

        let loop_start = frame_index;
        loop {
            if stop.load(Ordering::Relaxed) {
                let _ = child.kill();
                let _ = child.wait();
                return;
            }

            let mut data = vec![0u8; frame_bytes];
            if let Err(e) = stdout.read_exact(&mut data) {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    warn!("Error reading from ffmpeg: {}", e);
                }
                break;
            }

            let frame = DecodedFrame {
                pts: frame_duration * frame_index,
                data,
            };
            frame_index = frame_index.wrapping_add(1);
            if tx.send(frame).is_err() {
                let _ = child.kill();
                let _ = child.wait();
                return;
            }
        }

        let _ = child.wait();
        if frame_index == loop_start {
            error!("ffmpeg produced no frames for {}", path.display());
            return;
        }
        debug!("Video loop restarting");
    }
}
