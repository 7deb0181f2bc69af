use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, DualcapError};

fn default_settings_path() -> PathBuf {
    PathBuf::from(".dualcap/settings.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub translate: TranslateConfig,
    pub sync: SyncConfig,
    pub speech: SpeechEngineConfig,
    /// Where persisted user settings live
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Translation endpoint URL
    pub endpoint: String,
    /// Source language of every batch
    pub source_language: String,
    /// Client identifier sent with each request
    pub client: String,
    /// Request timeout in seconds, 0 disables the timeout
    #[serde(default)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Poll interval for timed-track modes (milliseconds)
    pub timed_interval_ms: u64,
    /// Poll interval for transcript mode (milliseconds)
    pub transcript_interval_ms: u64,
    /// Wait after switching a native track to hidden mode
    pub track_settle_ms: u64,
    /// Wait after opening the transcript panel
    pub transcript_settle_ms: u64,
}

impl SyncConfig {
    pub fn timed_interval(&self) -> Duration {
        Duration::from_millis(self.timed_interval_ms.max(1))
    }

    pub fn transcript_interval(&self) -> Duration {
        Duration::from_millis(self.transcript_interval_ms.max(1))
    }

    pub fn track_settle(&self) -> Duration {
        Duration::from_millis(self.track_settle_ms)
    }

    pub fn transcript_settle(&self) -> Duration {
        Duration::from_millis(self.transcript_settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechEngineConfig {
    /// Path to the speech synthesizer binary (e.g., espeak-ng)
    pub binary_path: String,
    /// Words per minute at rate 1.0
    pub base_words_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            translate: TranslateConfig {
                endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
                source_language: "en".to_string(),
                client: "gtx".to_string(),
                timeout_secs: 0,
            },
            sync: SyncConfig {
                timed_interval_ms: 100,
                transcript_interval_ms: 1000,
                track_settle_ms: 500,
                transcript_settle_ms: 2000,
            },
            speech: SpeechEngineConfig {
                binary_path: "espeak-ng".to_string(),
                base_words_per_minute: 175,
            },
            settings_path: default_settings_path(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DualcapError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| DualcapError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DualcapError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DualcapError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
