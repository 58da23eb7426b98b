//! YAML session settings and live reload.

use crate::controls::{DEFAULT_BPM, DEFAULT_DEBOUNCE};
use crate::effects::EffectId;
use crate::perf::DEFAULT_REPORT_INTERVAL;
use crate::transition::DEFAULT_TRANSITION;
use anyhow::{ensure, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing::{error, info, warn};

/// Desired state of one effect.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectSetting {
    pub name: EffectId,
    #[serde(default = "EffectSetting::default_enabled")]
    pub enabled: bool,
    /// Slider value in `[0, 1]`. Ignored for effects without one.
    #[serde(default)]
    pub intensity: Option<f32>,
}

impl EffectSetting {
    const fn default_enabled() -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Length of an effect's fade in or out.
    #[serde(with = "humantime_serde")]
    pub transition: Duration,
    /// Repeated toggles of one effect inside this window are dropped.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
    pub bpm: f32,
    /// Minimum spacing of fps reports.
    #[serde(with = "humantime_serde")]
    pub diagnostics_interval: Duration,
    pub effects: Vec<EffectSetting>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transition: DEFAULT_TRANSITION,
            debounce: DEFAULT_DEBOUNCE,
            bpm: DEFAULT_BPM,
            diagnostics_interval: DEFAULT_REPORT_INTERVAL,
            effects: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document means "all defaults".
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validated()
    }

    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.bpm.is_finite() && self.bpm > 0.0,
            "bpm must be positive, got {}",
            self.bpm
        );
        for setting in &self.effects {
            if let Some(value) = setting.intensity {
                ensure!(
                    (0.0..=1.0).contains(&value),
                    "intensity of {} must be within [0, 1], got {}",
                    setting.name,
                    value
                );
            }
        }
        for (i, setting) in self.effects.iter().enumerate() {
            ensure!(
                !self.effects[..i].iter().any(|s| s.name == setting.name),
                "effect {} is listed twice",
                setting.name
            );
        }
        Ok(self)
    }
}

/// Watches the session file and re-parses it on change.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())
            .context("failed to create config watcher")?;
        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", path.display()))?;
        info!("Watching config file {} for changes", path.display());

        Ok(Self {
            path,
            _watcher: watcher,
            rx,
        })
    }

    /// Returns the new config if the file changed and still parses. A broken
    /// edit is logged and the caller keeps its current settings.
    pub fn poll(&mut self) -> Option<SessionConfig> {
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        changed = true;
                    }
                }
                Err(e) => warn!("Config watch error: {}", e),
            }
        }
        if !changed {
            return None;
        }

        match SessionConfig::load(&self.path) {
            Ok(config) => {
                info!("Reloaded {}", self.path.display());
                Some(config)
            }
            Err(e) => {
                error!("Keeping previous settings: {:#}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SessionConfig::from_yaml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.transition, Duration::from_millis(300));
        assert_eq!(config.debounce, Duration::from_millis(50));
    }

    #[test]
    fn parses_durations_and_effects() {
        let config = SessionConfig::from_yaml_str(
            r#"
transition: 500ms
bpm: 128
effects:
  - name: wave
    intensity: 0.8
  - name: Hue_Rotate
    enabled: false
"#,
        )
        .unwrap();
        assert_eq!(config.transition, Duration::from_millis(500));
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.bpm, 128.0);
        assert_eq!(
            config.effects,
            vec![
                EffectSetting {
                    name: EffectId::Wave,
                    enabled: true,
                    intensity: Some(0.8),
                },
                EffectSetting {
                    name: EffectId::HueRotate,
                    enabled: false,
                    intensity: None,
                },
            ]
        );
    }

    #[test]
    fn rejects_unknown_effects_and_bad_values() {
        assert!(SessionConfig::from_yaml_str("effects: [{name: sparkle}]").is_err());
        assert!(SessionConfig::from_yaml_str("effects: [{name: wave, intensity: 1.5}]").is_err());
        assert!(SessionConfig::from_yaml_str("bpm: 0").is_err());
        assert!(SessionConfig::from_yaml_str("transiton: 1s").is_err());
        assert!(SessionConfig::from_yaml_str("effects: [{name: wave}, {name: wave}]").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        fs::write(&path, "bpm: 90\ndiagnostics_interval: 1s\n").unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.bpm, 90.0);
        assert_eq!(config.diagnostics_interval, Duration::from_secs(1));
        assert!(SessionConfig::load(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn watcher_picks_up_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        fs::write(&path, "bpm: 100\n").unwrap();

        let mut watcher = ConfigWatcher::new(&path).unwrap();

        fs::write(&path, "bpm: 140\n").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut reloaded = None;
        while reloaded.is_none() && Instant::now() < deadline {
            reloaded = watcher.poll();
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(reloaded.map(|c| c.bpm), Some(140.0));
    }
}
