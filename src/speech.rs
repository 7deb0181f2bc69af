//! Speech output for captions.
//!
//! `SpeechSink` sits between the playback loop and the speech engine. The loop
//! calls `speak` on every tick while a caption is active; the sink only starts
//! an utterance when the text actually changes.

use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SpeechEngineConfig;
use crate::error::{DualcapError, Result};
use crate::settings::{SpeechSettings, SpeechSettingsPatch};

/// Voice offered by a speech engine
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub id: String,
    /// BCP 47 style tag, e.g. `es-MX`
    pub language: String,
}

impl Voice {
    pub fn new<S: Into<String>, L: Into<String>>(id: S, language: L) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
        }
    }
}

/// One request to the speech engine
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<Voice>,
    pub language: String,
    pub rate: f32,
    pub volume: f32,
}

/// Completion report from a speech engine
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    Ended,
    Failed(String),
}

/// Main trait for speech synthesis
#[cfg_attr(test, mockall::automock)]
pub trait SpeechEngine: Send + Sync {
    /// Voices available on this engine
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking; returns once the utterance has been started
    fn speak(&self, utterance: &Utterance) -> Result<()>;

    /// Stop whatever is being spoken
    fn cancel(&self);
}

/// Voices matching a language, falling back to primary-subtag equality
pub fn voices_for_language(voices: &[Voice], language: &str) -> Vec<Voice> {
    let matching: Vec<Voice> = voices
        .iter()
        .filter(|voice| voice.language.starts_with(language))
        .cloned()
        .collect();

    if !matching.is_empty() {
        return matching;
    }

    voices
        .iter()
        .filter(|voice| voice.language.split('-').next() == Some(language))
        .cloned()
        .collect()
}

/// Deduplicating speech front-end shared by the playback loop and commands
pub struct SpeechSink {
    engine: Arc<dyn SpeechEngine>,
    settings: SpeechSettings,
    language: String,
    voice: Option<Voice>,
    last_spoken: String,
    in_flight: bool,
}

pub type SharedSpeech = Arc<Mutex<SpeechSink>>;

impl SpeechSink {
    pub fn new<S: Into<String>>(engine: Arc<dyn SpeechEngine>, settings: SpeechSettings, language: S) -> Self {
        let mut sink = Self {
            engine,
            settings,
            language: language.into(),
            voice: None,
            last_spoken: String::new(),
            in_flight: false,
        };

        if let Some(voice_id) = sink.settings.voice_id.clone() {
            sink.voice = sink.find_voice(&voice_id);
            if let Some(voice) = &sink.voice {
                info!("Speech voice loaded: {}", voice.id);
            }
        }

        sink
    }

    pub fn shared(self) -> SharedSpeech {
        Arc::new(Mutex::new(self))
    }

    pub fn settings(&self) -> &SpeechSettings {
        &self.settings
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn is_speaking(&self) -> bool {
        self.in_flight
    }

    fn find_voice(&self, voice_id: &str) -> Option<Voice> {
        self.engine.voices().into_iter().find(|voice| voice.id == voice_id)
    }

    /// Switch the utterance language; an automatically chosen voice is re-picked
    pub fn set_language(&mut self, language: &str) {
        if self.language != language {
            self.language = language.to_string();
            if self.settings.voice_id.is_none() {
                self.voice = None;
            }
        }
    }

    /// Speak `text` unless disabled, empty, or identical to the previous text.
    ///
    /// Returns whether an utterance was started.
    pub fn speak(&mut self, text: &str) -> bool {
        if !self.settings.enabled || text.trim().is_empty() || text == self.last_spoken {
            return false;
        }

        if self.in_flight {
            self.engine.cancel();
        }
        self.last_spoken = text.to_string();

        if self.voice.is_none() {
            self.voice = voices_for_language(&self.engine.voices(), &self.language)
                .into_iter()
                .next();
        }

        let utterance = Utterance {
            text: text.to_string(),
            voice: self.voice.clone(),
            language: self.language.clone(),
            rate: self.settings.rate,
            volume: self.settings.volume,
        };

        match self.engine.speak(&utterance) {
            Ok(()) => {
                self.in_flight = true;
                true
            }
            Err(e) => {
                error!("Speech error: {}", e);
                self.in_flight = false;
                false
            }
        }
    }

    /// Record an engine completion report
    pub fn on_event(&mut self, event: SpeechEvent) {
        if let SpeechEvent::Failed(reason) = &event {
            error!("Speech error: {}", reason);
        }
        self.in_flight = false;
    }

    /// Cancel any utterance and forget the last spoken text
    pub fn stop(&mut self) {
        if self.in_flight {
            self.engine.cancel();
            self.in_flight = false;
        }
        self.last_spoken.clear();
    }

    /// Apply a partial settings update; disabling cancels immediately
    pub fn update(&mut self, patch: &SpeechSettingsPatch) {
        if let Some(voice_id) = &patch.voice_id {
            match self.find_voice(voice_id) {
                Some(voice) => {
                    self.voice = Some(voice);
                    self.settings.voice_id = Some(voice_id.clone());
                }
                None => warn!("Speech voice not found: {}", voice_id),
            }
        }

        self.settings.apply(&SpeechSettingsPatch {
            voice_id: None,
            ..patch.clone()
        });

        if !self.settings.enabled {
            self.stop();
        }

        debug!(
            "Speech settings updated: enabled={}, rate={}, volume={}, voice={:?}",
            self.settings.enabled,
            self.settings.rate,
            self.settings.volume,
            self.voice.as_ref().map(|v| v.id.as_str())
        );
    }
}

/// Forward engine completion reports into the sink
pub fn spawn_event_pump(speech: SharedSpeech, mut events: mpsc::UnboundedReceiver<SpeechEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            speech.lock().await.on_event(event);
        }
    })
}

/// Engine that only logs utterances
#[derive(Default)]
pub struct LogSpeechEngine;

impl SpeechEngine for LogSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&self, utterance: &Utterance) -> Result<()> {
        info!(
            "🔊 [{} x{:.2} vol {:.0}%] {}",
            utterance.language,
            utterance.rate,
            utterance.volume * 100.0,
            utterance.text
        );
        Ok(())
    }

    fn cancel(&self) {}
}

/// Engine driving an external synthesizer process (espeak-ng compatible)
pub struct CommandSpeechEngine {
    config: SpeechEngineConfig,
    events: mpsc::UnboundedSender<SpeechEvent>,
    current: StdMutex<Option<oneshot::Sender<()>>>,
    voices: StdMutex<Vec<Voice>>,
}

impl CommandSpeechEngine {
    pub fn new(config: SpeechEngineConfig, events: mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self {
            config,
            events,
            current: StdMutex::new(None),
            voices: StdMutex::new(Vec::new()),
        }
    }

    /// Check the synthesizer binary can be executed
    pub async fn check_availability(&self) -> Result<()> {
        let output = tokio::process::Command::new(&self.config.binary_path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| DualcapError::Speech(format!("Speech synthesizer not found: {}", e)))?;

        if output.status.success() {
            info!("Speech synthesizer is available");
            Ok(())
        } else {
            Err(DualcapError::Speech("Speech synthesizer version check failed".to_string()))
        }
    }

    /// Query the synthesizer's voices once; `voices` serves this list afterwards
    pub async fn load_voices(&self) -> Result<usize> {
        let output = tokio::process::Command::new(&self.config.binary_path)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| DualcapError::Speech(format!("Listing voices failed: {}", e)))?;

        if !output.status.success() {
            return Err(DualcapError::Speech(format!(
                "Listing voices failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        let count = voices.len();
        if let Ok(mut cached) = self.voices.lock() {
            *cached = voices;
        }
        info!("Loaded {} speech voices", count);
        Ok(count)
    }

    fn build_args(&self, utterance: &Utterance) -> Vec<String> {
        let voice = utterance
            .voice
            .as_ref()
            .map(|voice| voice.id.clone())
            .unwrap_or_else(|| utterance.language.clone());
        let words_per_minute = (self.config.base_words_per_minute as f32 * utterance.rate).round() as u32;
        let amplitude = (utterance.volume.clamp(0.0, 1.0) * 100.0).round() as u32;

        vec![
            "-v".to_string(),
            voice,
            "-s".to_string(),
            words_per_minute.max(1).to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            utterance.text.clone(),
        ]
    }
}

/// Parse `espeak-ng --voices` output into voices
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            let language = columns.get(1)?;
            Some(Voice::new(*language, *language))
        })
        .collect()
}

impl SpeechEngine for CommandSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices
            .lock()
            .map(|voices| voices.clone())
            .unwrap_or_default()
    }

    fn speak(&self, utterance: &Utterance) -> Result<()> {
        let args = self.build_args(utterance);
        debug!("Executing: {} {}", self.config.binary_path, args.join(" "));

        let mut child = tokio::process::Command::new(&self.config.binary_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DualcapError::Speech(format!("Failed to start synthesizer: {}", e)))?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(cancel_tx);
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(status) if status.success() => SpeechEvent::Ended,
                        Ok(status) => SpeechEvent::Failed(format!("synthesizer exited with {}", status)),
                        Err(e) => SpeechEvent::Failed(e.to_string()),
                    };
                    let _ = events.send(event);
                }
                _ = cancel_rx => {
                    let _ = child.kill().await;
                }
            }
        });

        Ok(())
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(cancel) = current.take() {
                let _ = cancel.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> SpeechSettings {
        SpeechSettings {
            enabled: true,
            ..Default::default()
        }
    }

    fn engine_with_voices(voices: Vec<Voice>) -> MockSpeechEngine {
        let mut engine = MockSpeechEngine::new();
        engine.expect_voices().returning(move || voices.clone());
        engine
    }

    #[test]
    fn test_same_text_spoken_once() {
        let mut engine = engine_with_voices(Vec::new());
        engine.expect_speak().times(1).returning(|_| Ok(()));
        engine.expect_cancel().never();

        let mut sink = SpeechSink::new(Arc::new(engine), enabled(), "vi");
        assert!(sink.speak("Xin chào"));
        assert!(!sink.speak("Xin chào"));
        assert!(sink.is_speaking());
    }

    #[test]
    fn test_new_text_cancels_in_flight() {
        let mut engine = engine_with_voices(Vec::new());
        engine.expect_speak().times(2).returning(|_| Ok(()));
        engine.expect_cancel().times(1).return_const(());

        let mut sink = SpeechSink::new(Arc::new(engine), enabled(), "vi");
        sink.speak("Một");
        sink.speak("Hai");
    }

    #[test]
    fn test_disabled_or_empty_is_noop() {
        let mut engine = engine_with_voices(Vec::new());
        engine.expect_speak().never();

        let mut sink = SpeechSink::new(Arc::new(engine), SpeechSettings::default(), "vi");
        assert!(!sink.speak("Hello"));

        sink.settings.enabled = true;
        assert!(!sink.speak("   "));
    }

    #[test]
    fn test_engine_error_clears_in_flight() {
        let mut engine = engine_with_voices(Vec::new());
        engine
            .expect_speak()
            .returning(|_| Err(DualcapError::Speech("no audio device".to_string())));

        let mut sink = SpeechSink::new(Arc::new(engine), enabled(), "vi");
        assert!(!sink.speak("Hello"));
        assert!(!sink.is_speaking());
    }

    #[test]
    fn test_completion_event_clears_in_flight() {
        let mut engine = engine_with_voices(Vec::new());
        engine.expect_speak().returning(|_| Ok(()));
        engine.expect_cancel().never();

        let mut sink = SpeechSink::new(Arc::new(engine), enabled(), "vi");
        sink.speak("Hello");
        sink.on_event(SpeechEvent::Failed("interrupted".to_string()));
        assert!(!sink.is_speaking());
        // no cancel needed once the engine reported completion
        sink.speak("Next");
    }

    #[test]
    fn test_disabling_cancels_immediately() {
        let mut engine = engine_with_voices(Vec::new());
        engine.expect_speak().returning(|_| Ok(()));
        engine.expect_cancel().times(1).return_const(());

        let mut sink = SpeechSink::new(Arc::new(engine), enabled(), "vi");
        sink.speak("Hello");
        sink.update(&SpeechSettingsPatch {
            enabled: Some(false),
            ..Default::default()
        });
        assert!(!sink.is_speaking());
    }

    #[test]
    fn test_voice_auto_selection_and_utterance_fields() {
        let voices = vec![Voice::new("Anna", "de-DE"), Voice::new("Paulina", "es-MX")];
        let mut engine = engine_with_voices(voices);
        engine
            .expect_speak()
            .withf(|u| {
                u.voice.as_ref().map(|v| v.id.as_str()) == Some("Paulina")
                    && u.language == "es"
                    && u.rate == 1.5
            })
            .times(1)
            .returning(|_| Ok(()));

        let settings = SpeechSettings {
            enabled: true,
            rate: 1.5,
            ..Default::default()
        };
        let mut sink = SpeechSink::new(Arc::new(engine), settings, "es");
        assert!(sink.speak("Hola"));
        assert_eq!(sink.voice().map(|v| v.id.as_str()), Some("Paulina"));
    }

    #[test]
    fn test_unknown_voice_is_ignored() {
        let engine = engine_with_voices(vec![Voice::new("Anna", "de-DE")]);
        let mut sink = SpeechSink::new(Arc::new(engine), enabled(), "de");

        sink.update(&SpeechSettingsPatch {
            voice_id: Some("Nobody".to_string()),
            ..Default::default()
        });
        assert!(sink.settings().voice_id.is_none());

        sink.update(&SpeechSettingsPatch {
            voice_id: Some("Anna".to_string()),
            ..Default::default()
        });
        assert_eq!(sink.settings().voice_id.as_deref(), Some("Anna"));
    }

    #[test]
    fn test_voices_for_language_fallback() {
        let voices = vec![
            Voice::new("a", "en-US"),
            Voice::new("b", "pt-BR"),
            Voice::new("c", "zh"),
        ];
        assert_eq!(voices_for_language(&voices, "en").len(), 1);
        assert_eq!(voices_for_language(&voices, "pt-BR")[0].id, "b");
        assert!(voices_for_language(&voices, "ja").is_empty());
    }

    #[test]
    fn test_parse_voice_list() {
        let output = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
                      5  af              --/M      Afrikaans          gmw/af\n \
                      5  en-us           --/M      English_(America)  gmw/en-US           (en 3)\n";
        let voices = parse_voice_list(output);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[1], Voice::new("en-us", "en-us"));
    }

    #[tokio::test]
    async fn test_command_engine_voices_come_from_loaded_list() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = CommandSpeechEngine::new(
            SpeechEngineConfig {
                binary_path: "/nonexistent/espeak-ng".to_string(),
                base_words_per_minute: 175,
            },
            tx,
        );

        // Nothing loaded yet: no process is started on the caption path
        assert!(engine.voices().is_empty());
        assert!(matches!(engine.load_voices().await, Err(DualcapError::Speech(_))));
        assert!(engine.check_availability().await.is_err());
        assert!(engine.voices().is_empty());
    }

    #[tokio::test]
    async fn test_event_pump_forwards_events() {
        let mut engine = engine_with_voices(Vec::new());
        engine.expect_speak().returning(|_| Ok(()));
        engine.expect_cancel().never();

        let speech = SpeechSink::new(Arc::new(engine), enabled(), "vi").shared();
        speech.lock().await.speak("Hello");

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = spawn_event_pump(speech.clone(), rx);
        tx.send(SpeechEvent::Ended).unwrap();
        drop(tx);
        pump.await.unwrap();

        assert!(!speech.lock().await.is_speaking());
    }
}
