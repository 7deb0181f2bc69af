//! Mode controller for one tab.
//!
//! A `Session` owns everything that used to be tab-wide mutable state: the
//! current mode, the settings, the translation cache and the synchronizer.
//! Inbound commands from the settings surface go through `Session::handle`,
//! which always answers; failures are logged and show up as missing captions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::cue::{Cue, TrackInfo};
use crate::overlay::CaptionOverlay;
use crate::settings::{
    CaptionPosition, CaptionStylePatch, Settings, SettingsStore, SpeechSettingsPatch,
};
use crate::source::{CueSource, SourceKind};
use crate::speech::{SharedSpeech, SpeechEngine, SpeechSink};
use crate::sync::{Playback, PlaybackClock, SharedPlayback, SyncContext, Synchronizer};
use crate::translate::{segment, translate_sentences, Mapping, TranslationCache, Translator};

/// Which overlay is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Idle,
    /// Native English track translated to the target language
    NativeTrackTranslated,
    /// Native track in the target language shown as-is
    NativeTrackPassthrough,
    /// Transcript merged into sentences and translated
    TranscriptTranslated,
}

impl Mode {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Commands sent by the settings surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Command {
    StartTranslation {
        language: String,
        #[serde(default)]
        native: bool,
    },
    StopTranslation,
    QueryAvailableSubtitles,
    ToggleSpeechPanel,
    SetCaptionVisibility {
        visible: bool,
    },
    SetSpeechConfig {
        config: SpeechSettingsPatch,
    },
    SetCaptionStyle {
        style: CaptionStylePatch,
    },
    ResetCaptionStyle,
    SetCaptionPosition {
        position: CaptionPosition,
    },
}

/// Answer to a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Response {
    Success,
    Translation { mode: Mode },
    Subtitles { subtitles: Vec<TrackInfo> },
    SpeechPanel { shown: bool },
}

/// External collaborators of a session
pub struct SessionPorts {
    pub source: Arc<dyn CueSource>,
    pub translator: Arc<dyn Translator>,
    pub overlay: Arc<dyn CaptionOverlay>,
    pub clock: Arc<dyn PlaybackClock>,
    pub speech_engine: Arc<dyn SpeechEngine>,
    pub store: Arc<dyn SettingsStore>,
}

/// Everything a background translation needs to publish its result
struct TranslationJob {
    generation: u64,
    kind: SourceKind,
    language: String,
    cues: Vec<Cue>,
    translator: Arc<dyn Translator>,
    cache: Arc<Mutex<TranslationCache>>,
    playback: SharedPlayback,
    current_generation: Arc<AtomicU64>,
}

pub struct Session {
    id: Uuid,
    config: Config,
    settings: Settings,
    store: Arc<dyn SettingsStore>,
    source: Arc<dyn CueSource>,
    translator: Arc<dyn Translator>,
    overlay: Arc<dyn CaptionOverlay>,
    clock: Arc<dyn PlaybackClock>,
    speech: SharedSpeech,
    playback: SharedPlayback,
    cache: Arc<Mutex<TranslationCache>>,
    synchronizer: Synchronizer,
    mode: Mode,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(config: Config, ports: SessionPorts) -> Self {
        let settings = match ports.store.load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };

        let speech = SpeechSink::new(
            ports.speech_engine,
            settings.speech.clone(),
            settings.target_language.clone(),
        )
        .shared();
        let cache = TranslationCache::new(settings.target_language.clone());

        let id = Uuid::new_v4();
        info!("Session {} created (target language {})", id, settings.target_language);

        Self {
            id,
            config,
            settings,
            store: ports.store,
            source: ports.source,
            translator: ports.translator,
            overlay: ports.overlay,
            clock: ports.clock,
            speech,
            playback: Playback::empty().shared(),
            cache: Arc::new(Mutex::new(cache)),
            synchronizer: Synchronizer::new(),
            mode: Mode::Idle,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn speech(&self) -> SharedSpeech {
        self.speech.clone()
    }

    pub fn playback(&self) -> SharedPlayback {
        self.playback.clone()
    }

    pub fn is_synchronizing(&self) -> bool {
        self.synchronizer.is_running()
    }

    /// Handle one inbound command
    pub async fn handle(&mut self, command: Command) -> Response {
        match command {
            Command::StartTranslation { language, native } => {
                let mode = self.start_translation(&language, native).await;
                Response::Translation { mode }
            }
            Command::StopTranslation => {
                self.stop_translation().await;
                Response::Translation { mode: self.mode }
            }
            Command::QueryAvailableSubtitles => Response::Subtitles {
                subtitles: self.source.available_subtitles(),
            },
            Command::ToggleSpeechPanel => Response::SpeechPanel {
                shown: self.overlay.toggle_speech_panel(),
            },
            Command::SetCaptionVisibility { visible } => {
                self.settings.caption.visible = visible;
                self.overlay.set_visible(visible);
                self.persist();
                Response::Success
            }
            Command::SetSpeechConfig { config } => {
                let updated = {
                    let mut speech = self.speech.lock().await;
                    speech.update(&config);
                    speech.settings().clone()
                };
                self.settings.speech = updated;
                self.persist();
                Response::Success
            }
            Command::SetCaptionStyle { style } => {
                self.settings.caption.apply(&style);
                self.overlay.apply_style(&self.settings.caption);
                self.persist();
                Response::Success
            }
            Command::ResetCaptionStyle => {
                self.settings.caption.reset_style();
                self.overlay.apply_style(&self.settings.caption);
                self.persist();
                Response::Success
            }
            Command::SetCaptionPosition { position } => {
                self.settings.caption.position = Some(position);
                self.overlay.set_position(position);
                self.persist();
                Response::Success
            }
        }
    }

    /// Activate the overlay for `language`, tearing down any active one first
    pub async fn start_translation(&mut self, language: &str, native: bool) -> Mode {
        if self.mode.is_active() {
            info!("Replacing active {:?} overlay", self.mode);
            self.teardown().await;
        }

        info!(
            "Session {}: translation requested (language {}, native {})",
            self.id, language, native
        );

        if self.settings.target_language != language {
            self.settings.target_language = language.to_string();
            self.persist();
        }
        self.speech.lock().await.set_language(language);
        self.cache.lock().await.retarget(language);

        let mode = match (self.source.kind(), native) {
            (SourceKind::TimedTrack, true) => Mode::NativeTrackPassthrough,
            (SourceKind::TimedTrack, false) => Mode::NativeTrackTranslated,
            (SourceKind::Transcript, _) => Mode::TranscriptTranslated,
        };

        let track_language = match mode {
            Mode::NativeTrackPassthrough => language.to_string(),
            _ => self.config.translate.source_language.clone(),
        };

        let cues = match self.source.extract(&track_language).await {
            Ok(cues) => cues,
            Err(e) => {
                error!("Failed to extract subtitles: {}", e);
                return self.mode;
            }
        };

        if cues.is_empty() {
            info!("No {} subtitles available on this page, overlay not started", track_language);
            return self.mode;
        }

        let kind = self.source.kind();
        let (mapping, interval) = match mode {
            Mode::NativeTrackPassthrough => (Mapping::Passthrough, self.config.sync.timed_interval()),
            Mode::NativeTrackTranslated => (Mapping::Empty, self.config.sync.timed_interval()),
            _ => (Mapping::Empty, self.config.sync.transcript_interval()),
        };

        let generation = self.replace_playback(Playback::new(kind, cues.clone(), mapping)).await;
        self.show_overlay();
        self.synchronizer.start(interval, self.sync_context());

        if mode != Mode::NativeTrackPassthrough {
            let job = TranslationJob {
                generation,
                kind,
                language: language.to_string(),
                cues,
                translator: self.translator.clone(),
                cache: self.cache.clone(),
                playback: self.playback.clone(),
                current_generation: self.generation.clone(),
            };
            self.pending = Some(tokio::spawn(run_translation(job)));
        }

        self.mode = mode;
        info!("Session {} now {:?}", self.id, self.mode);
        self.mode
    }

    /// Return to `Idle`, removing every trace of the overlay
    pub async fn stop_translation(&mut self) {
        if self.mode.is_active() {
            self.teardown().await;
            info!("Session {} idle", self.id);
        }
    }

    /// Wait for the most recent background translation to finish
    pub async fn wait_for_translation(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Err(e) = pending.await {
                warn!("Translation task failed: {}", e);
            }
        }
    }

    async fn teardown(&mut self) {
        self.synchronizer.stop().await;
        self.replace_playback(Playback::empty()).await;
        self.overlay.remove();
        self.overlay.restore_native_captions();
        self.speech.lock().await.stop();
        self.mode = Mode::Idle;
    }

    /// Swap the playback state and invalidate in-flight translations
    async fn replace_playback(&self, playback: Playback) -> u64 {
        let mut current = self.playback.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *current = playback;
        generation
    }

    fn show_overlay(&self) {
        let caption = &self.settings.caption;
        self.overlay.hide_native_captions();
        self.overlay.create(caption);
        self.overlay.set_visible(caption.visible);
        if let Some(position) = caption.position {
            self.overlay.set_position(position);
        }
    }

    fn sync_context(&self) -> SyncContext {
        SyncContext {
            clock: self.clock.clone(),
            playback: self.playback.clone(),
            overlay: self.overlay.clone(),
            speech: self.speech.clone(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.settings) {
            warn!("Failed to save settings: {}", e);
        }
    }

    /// Poll interval used by the active mode
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.mode {
            Mode::Idle => None,
            Mode::NativeTrackPassthrough | Mode::NativeTrackTranslated => Some(self.config.sync.timed_interval()),
            Mode::TranscriptTranslated => Some(self.config.sync.transcript_interval()),
        }
    }
}

/// Translate uncached sentences and publish the mapping if still current
async fn run_translation(job: TranslationJob) {
    let segmentation = segment(&job.cues);
    let texts = segmentation.texts();
    let pending: Vec<String> = job
        .cache
        .lock()
        .await
        .missing(&texts)
        .into_iter()
        .map(str::to_string)
        .collect();

    if !pending.is_empty() {
        let sentences: Vec<&str> = pending.iter().map(String::as_str).collect();
        let translated = match translate_sentences(job.translator.as_ref(), &sentences, &job.language).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Translation failed, captions stay blank until retried: {}", e);
                return;
            }
        };

        let mut cache = job.cache.lock().await;
        if cache.target_language() != job.language {
            info!("Discarding translation for {}: target language changed", job.language);
            return;
        }
        cache.record(&sentences, &translated);
    } else {
        info!("All {} sentences already cached", texts.len());
    }

    let cache = job.cache.lock().await;
    let mapping = match job.kind {
        SourceKind::TimedTrack => Mapping::index_keyed_from_cache(&segmentation, &cache),
        SourceKind::Transcript => Mapping::ByText(cache.clone()),
    };

    let mut playback = job.playback.write().await;
    if job.current_generation.load(Ordering::SeqCst) != job.generation {
        info!("Discarding stale translation (generation {})", job.generation);
        return;
    }
    info!("Translations loaded for {} cues", mapping.len());
    playback.mapping = mapping;
}
