//! Persisted user settings.
//!
//! Settings survive across sessions. Every field falls back to its default
//! when absent, so a partially written or empty store still loads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{DualcapError, Result};

fn default_target_language() -> String {
    "vi".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_target_language")]
    pub target_language: String,
    #[serde(default)]
    pub speech: SpeechSettings,
    #[serde(default)]
    pub caption: CaptionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            speech: SpeechSettings::default(),
            caption: CaptionSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub rate: f32,
    pub volume: f32,
    pub voice_id: Option<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: 1.0,
            volume: 1.0,
            voice_id: None,
        }
    }
}

/// Partial update for speech parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSettingsPatch {
    pub enabled: Option<bool>,
    pub rate: Option<f32>,
    pub volume: Option<f32>,
    pub voice_id: Option<String>,
}

impl SpeechSettings {
    pub fn apply(&mut self, patch: &SpeechSettingsPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(rate) = patch.rate {
            self.rate = rate;
        }
        if let Some(volume) = patch.volume {
            self.volume = volume;
        }
        if let Some(voice_id) = &patch.voice_id {
            self.voice_id = Some(voice_id.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    pub font_size: u32,
    pub bg_color: String,
    pub text_color: String,
    /// Background opacity in percent (0-100)
    pub bg_opacity: u8,
    pub visible: bool,
    pub position: Option<CaptionPosition>,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            font_size: 22,
            bg_color: "#000000".to_string(),
            text_color: "#FFFFFF".to_string(),
            bg_opacity: 70,
            visible: true,
            position: None,
        }
    }
}

/// Partial update for caption styling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionStylePatch {
    pub font_size: Option<u32>,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub bg_opacity: Option<u8>,
}

impl CaptionSettings {
    pub fn apply(&mut self, patch: &CaptionStylePatch) {
        if let Some(font_size) = patch.font_size {
            self.font_size = font_size;
        }
        if let Some(bg_color) = &patch.bg_color {
            self.bg_color = bg_color.clone();
        }
        if let Some(text_color) = &patch.text_color {
            self.text_color = text_color.clone();
        }
        if let Some(bg_opacity) = patch.bg_opacity {
            self.bg_opacity = bg_opacity.min(100);
        }
    }

    /// Restore the style fields to defaults, keeping visibility and position
    pub fn reset_style(&mut self) {
        let defaults = Self::default();
        self.font_size = defaults.font_size;
        self.bg_color = defaults.bg_color;
        self.text_color = defaults.text_color;
        self.bg_opacity = defaults.bg_opacity;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptionPosition {
    pub x: f64,
    pub y: f64,
}

/// Port for loading and saving settings
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// TOML file backed settings store
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!("No settings file at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| DualcapError::Settings(format!("Failed to read settings: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| DualcapError::Settings(format!("Failed to parse settings: {}", e)))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(settings)
            .map_err(|e| DualcapError::Settings(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(&self.path, content)
            .map_err(|e| DualcapError::Settings(format!("Failed to write settings: {}", e)))
    }
}

/// In-memory settings store, used when nothing should touch disk
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        let guard = self
            .settings
            .lock()
            .map_err(|_| DualcapError::Settings("settings lock poisoned".to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| DualcapError::Settings("settings lock poisoned".to_string()))?;
        *guard = Some(settings.clone());
        Ok(())
    }
}
