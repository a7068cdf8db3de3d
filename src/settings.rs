//! Persisted user settings, stored as JSON under the XDG config directory.

use crate::config::{
    DEFAULT_BALANCE_GAIN_FACTOR, DEFAULT_HEADROOM_FACTOR, DEFAULT_SPLIT_FREQUENCY,
};
use crate::engine::{DEFAULT_IDLE_DECAY, DEFAULT_TARGET_FPS};
use crate::render::DEFAULT_SKIN;
use crate::util::audio::DEFAULT_SAMPLE_RATE;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const MAX_TARGET_FPS: u32 = 240;

fn config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("termblip")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sample_rate: f32,
    pub split_frequency: f32,
    pub balance_gain_factor: f32,
    pub headroom_factor: f32,
    pub idle_decay: f32,
    pub target_fps: u32,
    pub skin: String,
    pub last_device: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            split_frequency: DEFAULT_SPLIT_FREQUENCY,
            balance_gain_factor: DEFAULT_BALANCE_GAIN_FACTOR,
            headroom_factor: DEFAULT_HEADROOM_FACTOR,
            idle_decay: DEFAULT_IDLE_DECAY,
            target_fps: DEFAULT_TARGET_FPS,
            skin: DEFAULT_SKIN.to_string(),
            last_device: None,
        }
    }
}

impl Settings {
    /// Replace values that cannot be meaningful with their defaults.
    /// Range checks against each other are left to `AnalyzerConfig::new`.
    pub fn sanitize(&mut self) {
        let defaults = Settings::default();
        let finite_or = |value: f32, fallback: f32| if value.is_finite() { value } else { fallback };

        self.sample_rate = finite_or(self.sample_rate, defaults.sample_rate);
        self.split_frequency = finite_or(self.split_frequency, defaults.split_frequency);
        self.balance_gain_factor =
            finite_or(self.balance_gain_factor, defaults.balance_gain_factor);
        self.headroom_factor = finite_or(self.headroom_factor, defaults.headroom_factor);
        self.idle_decay = finite_or(self.idle_decay, defaults.idle_decay).clamp(0.0, 1.0);
        self.target_fps = self.target_fps.clamp(1, MAX_TARGET_FPS);
        if self.skin.trim().is_empty() {
            self.skin = defaults.skin;
        }
        if self
            .last_device
            .as_deref()
            .is_some_and(|device| device.trim().is_empty())
        {
            self.last_device = None;
        }
    }
}

#[derive(Debug)]
pub struct SettingsManager {
    path: PathBuf,
    pub data: Settings,
    last_written: Option<String>,
}

impl SettingsManager {
    pub fn load_or_default() -> Self {
        Self::load_from(config_dir().join("settings.json"))
    }

    /// Missing or unreadable files yield defaults; a parse error is logged.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let parsed: Option<Settings> = fs::read_to_string(&path).ok().and_then(|s| {
            serde_json::from_str(&s)
                .map_err(|e| warn!("[settings] parse error {path:?}: {e}"))
                .ok()
        });

        let mut data = parsed.unwrap_or_default();
        data.sanitize();
        let last_written = fs::read_to_string(&path)
            .ok()
            .filter(|on_disk| serde_json::to_string_pretty(&data).ok().as_ref() == Some(on_disk));
        Self {
            path,
            data,
            last_written,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.data
    }

    pub fn set_last_device(&mut self, device: Option<String>) {
        self.data.last_device = device;
    }

    /// Write the current settings atomically. Returns `false` when the file
    /// already holds identical content.
    pub fn persist(&mut self) -> io::Result<bool> {
        self.data.sanitize();
        let json = serde_json::to_string_pretty(&self.data)?;
        if self.last_written.as_deref() == Some(json.as_str()) {
            debug!("[settings] unchanged, skipping write");
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &self.path)?;
        debug!("[settings] wrote {:?}", self.path);
        self.last_written = Some(json);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let manager = SettingsManager::load_from(dir.path().join("settings.json"));
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "skin": "fire", "target_fps": 30 }"#).unwrap();

        let manager = SettingsManager::load_from(&path);
        assert_eq!(manager.settings().skin, "fire");
        assert_eq!(manager.settings().target_fps, 30);
        assert_eq!(manager.settings().headroom_factor, DEFAULT_HEADROOM_FACTOR);
        assert_eq!(manager.settings().last_device, None);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let manager = SettingsManager::load_from(&path);
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn persist_round_trips_and_skips_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut manager = SettingsManager::load_from(&path);
        manager.data.skin = "rainbow".into();
        manager.set_last_device(Some("alsa_output.usb.monitor".into()));
        assert!(manager.persist().unwrap());
        assert!(!manager.persist().unwrap());
        assert!(!path.with_extension("json.tmp").exists());

        let mut reloaded = SettingsManager::load_from(&path);
        assert_eq!(reloaded.settings(), manager.settings());
        assert!(!reloaded.persist().unwrap(), "fresh load matches disk");
    }

    #[test]
    fn sanitize_repairs_out_of_range_values() {
        let mut settings = Settings {
            idle_decay: 3.0,
            target_fps: 0,
            skin: "  ".into(),
            last_device: Some(String::new()),
            ..Settings::default()
        };
        settings.sanitize();
        assert_eq!(settings.idle_decay, 1.0);
        assert_eq!(settings.target_fps, 1);
        assert_eq!(settings.skin, DEFAULT_SKIN);
        assert_eq!(settings.last_device, None);
    }
}
