use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cue::{Cue, TrackInfo, TrackKind};
use crate::error::Result;
use super::{CueSource, SourceKind};

/// Native text track as exposed by the video element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeTrack {
    pub language: String,
    #[serde(default)]
    pub label: Option<String>,
    pub kind: TrackKind,
    #[serde(default)]
    pub cues: Vec<NativeCue>,
}

/// One native cue object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl NativeTrack {
    pub fn info(&self) -> TrackInfo {
        let label = match &self.label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => self.language.to_uppercase(),
        };

        TrackInfo {
            language: self.language.clone(),
            label,
            kind: self.kind,
        }
    }
}

/// Timed-track source: one cue per native cue object
pub struct TimedTrackSource {
    tracks: Vec<NativeTrack>,
    settle_delay: Duration,
}

impl TimedTrackSource {
    pub fn new(tracks: Vec<NativeTrack>) -> Self {
        Self {
            tracks,
            settle_delay: Duration::ZERO,
        }
    }

    /// Wait applied after switching the track to hidden mode, before reading cues
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    fn find_track(&self, language: &str) -> Option<&NativeTrack> {
        self.tracks.iter().find(|track| track.language == language)
    }
}

/// Flatten native cues into cues, joining multi-line text with spaces
pub fn extract_timed_cues(cues: &[NativeCue]) -> Vec<Cue> {
    cues.iter()
        .map(|cue| Cue::timed(cue.start, cue.end, cue.text.replace('\n', " ")))
        .collect()
}

#[async_trait]
impl CueSource for TimedTrackSource {
    fn kind(&self) -> SourceKind {
        SourceKind::TimedTrack
    }

    fn available_subtitles(&self) -> Vec<TrackInfo> {
        self.tracks
            .iter()
            .filter(|track| track.kind.is_textual())
            .map(NativeTrack::info)
            .collect()
    }

    async fn extract(&self, language: &str) -> Result<Vec<Cue>> {
        if self.tracks.is_empty() {
            info!("No tracks found");
            return Ok(Vec::new());
        }

        let Some(track) = self.find_track(language) else {
            warn!("Track not found for language: {}", language);
            return Ok(Vec::new());
        };

        if !self.settle_delay.is_zero() {
            debug!("Waiting {:?} for track {} to load", self.settle_delay, language);
            tokio::time::sleep(self.settle_delay).await;
        }

        let cues = extract_timed_cues(&track.cues);
        info!("Extracted {} cues from {} track", cues.len(), language);
        Ok(cues)
    }
}
