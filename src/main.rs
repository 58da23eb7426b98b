//! ShaderDeck: toggle live shader effects over a camera or video feed.

use anyhow::{anyhow, Result};
use clap::Parser;
use shaderdeck::capture::{AsyncCapture, CaptureBackend, CaptureConfig, FrameSource, NokhwaCapture};
use shaderdeck::config::{ConfigWatcher, SessionConfig};
use shaderdeck::controls::EffectDeck;
use shaderdeck::driver::{DrivingLoop, TickOutcome};
use shaderdeck::effects::{EffectId, Stage};
use shaderdeck::output::WindowCanvas;
use shaderdeck::perf::{LogObserver, PerfReporter, PerformanceObserver};
use shaderdeck::video::{StillImage, VideoPlayer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

/// Keys toggling effects, in registry order.
const EFFECT_KEYS: [&str; EffectId::COUNT] =
    ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "q", "w", "e"];

const INTENSITY_STEP: f32 = 0.1;
const BPM_STEP: f32 = 1.0;

/// How often a settled loop still checks the session file.
const RELOAD_POLL: Duration = Duration::from_millis(250);

/// Live shader effects over camera, video or still input.
#[derive(Parser, Debug)]
#[command(name = "shaderdeck")]
#[command(about = "Toggle GPU shader effects over live video in real-time")]
struct Args {
    /// Camera device index
    #[arg(short, long, default_value = "0")]
    input: u32,

    /// Play a video file (looped) instead of the camera
    #[arg(short, long, conflicts_with = "image")]
    file: Option<PathBuf>,

    /// Use a still image instead of the camera
    #[arg(long)]
    image: Option<PathBuf>,

    /// Requested capture and initial window width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Requested capture and initial window height
    #[arg(long, default_value = "720")]
    height: u32,

    /// Target frames per second
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// YAML session file, reloaded on change
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tempo for beat-synced effects (overrides the session file)
    #[arg(long)]
    bpm: Option<f32>,

    /// List available cameras and exit
    #[arg(long)]
    list_devices: bool,

    /// List effects with their keys and exit
    #[arg(long)]
    list_effects: bool,
}

/// Ticks at the frame rate while anything may change. A settled loop sleeps
/// until the next event, or until the next file check when reloading.
fn control_flow(settled: bool, watching: bool, next_tick: Instant, now: Instant) -> ControlFlow {
    match (settled, watching) {
        (false, _) => ControlFlow::WaitUntil(next_tick),
        (true, true) => ControlFlow::WaitUntil(now + RELOAD_POLL),
        (true, false) => ControlFlow::Wait,
    }
}

fn effect_for_key(key: &str) -> Option<EffectId> {
    let key = key.to_ascii_lowercase();
    EFFECT_KEYS
        .iter()
        .position(|k| *k == key)
        .map(|i| EffectId::ALL[i])
}

/// Observer shown in the window title, also logged.
struct TitleObserver {
    window: Arc<Window>,
    log: LogObserver,
}

impl PerformanceObserver for TitleObserver {
    fn on_render_performance(&mut self, fps: f32, frame_time_ms: f32) {
        self.log.on_render_performance(fps, frame_time_ms);
        self.window.set_title(&format!(
            "ShaderDeck - {:.0} fps, {:.1} ms",
            fps, frame_time_ms
        ));
    }
}

struct ShaderDeckApp {
    args: Args,
    settings: SessionConfig,
    deck: EffectDeck,
    source: Option<Box<dyn FrameSource>>,
    watcher: Option<ConfigWatcher>,
    driver: Option<DrivingLoop<WindowCanvas>>,
    window: Option<Arc<Window>>,
    frame_duration: Duration,
    next_tick: Instant,
    settled: bool,
    last_touched: Option<EffectId>,
    setup_error: Option<anyhow::Error>,
}

impl ShaderDeckApp {
    fn new(args: Args, settings: SessionConfig, source: Box<dyn FrameSource>) -> Self {
        let now = Instant::now();
        let mut deck = EffectDeck::new(settings.transition, settings.debounce);
        deck.set_bpm(settings.bpm);
        deck.apply_settings(&settings.effects, now);

        let watcher = args.config.as_ref().and_then(|path| match ConfigWatcher::new(path) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Live reload disabled: {:#}", e);
                None
            }
        });

        Self {
            frame_duration: Duration::from_secs_f64(1.0 / args.fps as f64),
            args,
            settings,
            deck,
            source: Some(source),
            watcher,
            driver: None,
            window: None,
            next_tick: now,
            settled: false,
            last_touched: None,
            setup_error: None,
        }
    }

    fn create_driver(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = WindowAttributes::default()
            .with_title("ShaderDeck")
            .with_inner_size(PhysicalSize::new(self.args.width, self.args.height));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let canvas = WindowCanvas::new(window.clone())?;

        let source = self
            .source
            .take()
            .ok_or_else(|| anyhow!("video source already consumed"))?;
        let reporter = PerfReporter::new(
            self.settings.diagnostics_interval,
            Box::new(TitleObserver {
                window: window.clone(),
                log: LogObserver,
            }),
        );

        let mut driver = DrivingLoop::new(canvas, source, reporter);
        driver.start(Instant::now());
        self.driver = Some(driver);
        self.window = Some(window);
        info!("Window created, press 1-9, 0, Q, W, E to toggle effects");
        Ok(())
    }

    /// Resumes ticking right away after the loop settled.
    fn wake(&mut self) {
        if self.settled {
            debug!("Waking the render loop");
        }
        self.settled = false;
        self.next_tick = Instant::now();
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(driver) = &mut self.driver {
            driver.stop();
        }
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let now = Instant::now();
        self.wake();
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => self.shutdown(event_loop),
            Key::Character(c) => match c.as_str() {
                "[" | "]" => {
                    let Some(id) = self.last_touched else {
                        return;
                    };
                    let delta = if c.as_str() == "]" { INTENSITY_STEP } else { -INTENSITY_STEP };
                    self.deck.nudge_intensity(id, delta);
                    info!("{} intensity {:.1}", id, self.deck.intensity(id));
                }
                "-" | "=" => {
                    let delta = if c.as_str() == "=" { BPM_STEP } else { -BPM_STEP };
                    let bpm = (self.deck.bpm() + delta).max(BPM_STEP);
                    self.deck.set_bpm(bpm);
                    info!("Tempo {:.0} bpm", bpm);
                }
                key => {
                    if let Some(id) = effect_for_key(key) {
                        self.last_touched = Some(id);
                        self.deck.toggle_effect(id, now);
                    }
                }
            },
            _ => {}
        }
    }

    /// Applies a changed session file. Returns whether one was applied.
    fn reload_config(&mut self) -> bool {
        let Some(settings) = self.watcher.as_mut().and_then(|w| w.poll()) else {
            return false;
        };
        let now = Instant::now();
        self.deck.set_timing(settings.transition, settings.debounce);
        self.deck.set_bpm(self.args.bpm.unwrap_or(settings.bpm));
        self.deck.apply_settings(&settings.effects, now);
        if let Some(driver) = &mut self.driver {
            driver.reporter_mut().set_interval(settings.diagnostics_interval);
        }
        self.settings = settings;
        true
    }
}

impl ApplicationHandler for ShaderDeckApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.driver.is_some() || self.setup_error.is_some() {
            return;
        }
        if let Err(e) = self.create_driver(event_loop) {
            error!("Setup failed: {:#}", e);
            self.setup_error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window closed");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(driver) = &mut self.driver {
                    driver.renderer_mut().resize(size);
                    driver.invalidate();
                }
                self.wake();
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::RedrawRequested => {
                let Some(driver) = &mut self.driver else {
                    return;
                };
                let outcome = driver.tick(&mut self.deck, Instant::now());
                self.settled = outcome == TickOutcome::Idle && driver.is_settled();
                match outcome {
                    TickOutcome::Skipped => debug!("Waiting for first video frame"),
                    TickOutcome::Stopped => event_loop.exit(),
                    TickOutcome::Idle if self.settled => debug!("Render loop settled"),
                    TickOutcome::Drawn | TickOutcome::Idle => {}
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.reload_config() {
            self.wake();
        }

        let now = Instant::now();
        if !self.settled && now >= self.next_tick {
            self.next_tick = now + self.frame_duration;
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
        event_loop.set_control_flow(control_flow(
            self.settled,
            self.watcher.is_some(),
            self.next_tick,
            now,
        ));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(driver) = &mut self.driver {
            driver.stop();
        }
    }
}

fn open_source(args: &Args) -> Result<Box<dyn FrameSource>> {
    if let Some(path) = &args.file {
        return Ok(Box::new(VideoPlayer::open(path)?));
    }
    if let Some(path) = &args.image {
        return Ok(Box::new(StillImage::open(path)?));
    }

    info!("Opening camera device {}...", args.input);
    let capture = AsyncCapture::<NokhwaCapture>::open(CaptureConfig {
        device_index: args.input,
        width: args.width,
        height: args.height,
        fps: args.fps,
    })?;
    let (w, h) = capture.natural_size();
    info!("Camera opened at {}x{}", w, h);
    Ok(Box::new(capture))
}

fn list_effects() {
    println!("Effects (key, name, stage, default intensity):");
    for (key, id) in EFFECT_KEYS.iter().zip(EffectId::ALL) {
        let stage = match id.stage() {
            Stage::Mapping => "mapping",
            Stage::Color => "color",
        };
        let intensity = id
            .definition()
            .default_intensity
            .map_or_else(|| "on/off".to_string(), |v| format!("{:.1}", v));
        println!("  [{}] {:<14} {:<8} {}", key.to_uppercase(), id.name(), stage, intensity);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.list_devices {
        println!("Available cameras:");
        match NokhwaCapture::list_devices() {
            Ok(devices) => {
                for device in devices {
                    println!("  [{}] {}", device.index, device.name);
                }
            }
            Err(e) => eprintln!("Failed to list devices: {}", e),
        }
        return Ok(());
    }
    if args.list_effects {
        list_effects();
        return Ok(());
    }

    let mut settings = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(bpm) = args.bpm {
        settings.bpm = bpm;
        settings = settings.validated()?;
    }

    info!("Starting ShaderDeck...");
    let source = open_source(&args)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = ShaderDeckApp::new(args, settings, source);
    event_loop.run_app(&mut app)?;

    match app.setup_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_effect_has_a_key() {
        for (i, key) in EFFECT_KEYS.iter().enumerate() {
            assert_eq!(effect_for_key(key), Some(EffectId::ALL[i]));
        }
        assert_eq!(effect_for_key("Q"), Some(EffectId::ALL[10]));
        assert_eq!(effect_for_key("z"), None);
    }

    #[test]
    fn settled_loop_stops_ticking() {
        let now = Instant::now();
        let next_tick = now + Duration::from_millis(33);
        assert_eq!(
            control_flow(false, false, next_tick, now),
            ControlFlow::WaitUntil(next_tick)
        );
        assert_eq!(control_flow(true, false, next_tick, now), ControlFlow::Wait);
        assert_eq!(
            control_flow(true, true, next_tick, now),
            ControlFlow::WaitUntil(now + RELOAD_POLL)
        );
    }

    #[test]
    fn cli_rejects_zero_fps() {
        assert!(Args::try_parse_from(["shaderdeck", "--fps", "0"]).is_err());
        let args = Args::try_parse_from(["shaderdeck", "--file", "clip.mp4", "--bpm", "128"]).unwrap();
        assert_eq!(args.file, Some(PathBuf::from("clip.mp4")));
        assert_eq!(args.bpm, Some(128.0));
    }
}
