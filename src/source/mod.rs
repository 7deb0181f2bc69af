// Pluggable cue sources
//
// Each supported platform exposes subtitles in its own shape:
// - Track: timed native text tracks (one cue per caption line)
// - Transcript: a paragraph transcript with coarse time labels, merged into sentences
//
// Locating those structures on a live page is the host's job. Sources here
// receive the already scraped data (see `PageSnapshot`) and turn it into cues.

pub mod snapshot;
pub mod track;
pub mod transcript;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use snapshot::*;
pub use track::*;
pub use transcript::*;

use crate::config::SyncConfig;
use crate::cue::{Cue, TrackInfo};
use crate::error::{DualcapError, Result};

/// Shape of the cues a source produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Cues carry `[start, end]` time ranges
    TimedTrack,
    /// Cues carry transcript time labels
    Transcript,
}

/// Main trait for subtitle sources
#[async_trait]
pub trait CueSource: Send + Sync {
    /// Shape of the cues this source yields
    fn kind(&self) -> SourceKind;

    /// Subtitle tracks currently offered by the page
    fn available_subtitles(&self) -> Vec<TrackInfo>;

    /// Extract cues for a language in timeline order.
    ///
    /// An empty result means the feature is unavailable on this page.
    async fn extract(&self, language: &str) -> Result<Vec<Cue>>;
}

/// Learning platforms with a known subtitle shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Native timed text tracks on the video element
    Coursera,
    /// Transcript panel only
    DeepLearningAi,
}

impl Platform {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.contains("coursera.org") {
            Ok(Self::Coursera)
        } else if url.contains("learn.deeplearning.ai") {
            Ok(Self::DeepLearningAi)
        } else {
            Err(DualcapError::UnsupportedPlatform(url.to_string()))
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Coursera => SourceKind::TimedTrack,
            Self::DeepLearningAi => SourceKind::Transcript,
        }
    }
}

/// Factory for creating cue sources
pub struct CueSourceFactory;

impl CueSourceFactory {
    /// Build the source matching the snapshot's platform
    pub fn from_snapshot(snapshot: PageSnapshot, sync: &SyncConfig) -> Result<Arc<dyn CueSource>> {
        let platform = Platform::from_url(&snapshot.url)?;

        match platform.source_kind() {
            SourceKind::TimedTrack => Ok(Arc::new(
                TimedTrackSource::new(snapshot.tracks).with_settle_delay(sync.track_settle()),
            )),
            SourceKind::Transcript => Ok(Arc::new(
                TranscriptSource::new(snapshot.transcript).with_settle_delay(sync.transcript_settle()),
            )),
        }
    }
}
