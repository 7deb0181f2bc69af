use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::cue::{Cue, TimeLabel, TrackInfo, TrackKind};
use crate::error::Result;
use super::{CueSource, SourceKind};

/// One transcript paragraph: displayed time label plus its text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptParagraph {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub text: String,
}

impl TranscriptParagraph {
    pub fn new<T: Into<String>, S: Into<String>>(time: T, text: S) -> Self {
        Self {
            time: time.into(),
            text: text.into(),
        }
    }
}

/// Merge transcript fragments into sentence-level cues.
///
/// Fragments accumulate until one ends with "." or the input runs out. A
/// merged cue takes the first non-empty time label of its run; cues without
/// a label or without text are dropped.
pub fn merge_transcript(paragraphs: &[TranscriptParagraph]) -> Vec<Cue> {
    let mut merged = Vec::new();
    let mut label = String::new();
    let mut buffer = String::new();

    for (idx, paragraph) in paragraphs.iter().enumerate() {
        if label.is_empty() {
            label = paragraph.time.trim().to_string();
        }
        buffer.push(' ');
        buffer.push_str(&paragraph.text);

        if paragraph.text.trim().ends_with('.') || idx == paragraphs.len() - 1 {
            let text = buffer.trim().to_string();
            if !label.is_empty() && !text.is_empty() {
                merged.push(Cue::labelled(TimeLabel::parse(label.clone()), text));
            }
            label.clear();
            buffer.clear();
        }
    }

    merged
}

/// Transcript source: paragraphs merged into sentence cues
pub struct TranscriptSource {
    paragraphs: Vec<TranscriptParagraph>,
    settle_delay: Duration,
}

impl TranscriptSource {
    pub fn new(paragraphs: Vec<TranscriptParagraph>) -> Self {
        Self {
            paragraphs,
            settle_delay: Duration::ZERO,
        }
    }

    /// Wait applied after opening the transcript panel, before reading it
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[async_trait]
impl CueSource for TranscriptSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Transcript
    }

    fn available_subtitles(&self) -> Vec<TrackInfo> {
        // The transcript panel is English only
        vec![TrackInfo {
            language: "en".to_string(),
            label: "English".to_string(),
            kind: TrackKind::Captions,
        }]
    }

    async fn extract(&self, _language: &str) -> Result<Vec<Cue>> {
        if !self.settle_delay.is_zero() {
            debug!("Waiting {:?} for transcript to load", self.settle_delay);
            tokio::time::sleep(self.settle_delay).await;
        }

        if self.paragraphs.is_empty() {
            info!("No transcript paragraphs found");
            return Ok(Vec::new());
        }

        let cues = merge_transcript(&self.paragraphs);
        info!("Merged {} transcript paragraphs into {} sentences", self.paragraphs.len(), cues.len());
        Ok(cues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::CueAnchor;

    fn label_of(cue: &Cue) -> &str {
        match &cue.anchor {
            CueAnchor::Label(label) => &label.raw,
            CueAnchor::Range { .. } => panic!("expected a labelled cue"),
        }
    }

    #[test]
    fn test_merge_until_sentence_end() {
        let paragraphs = vec![
            TranscriptParagraph::new("0:00", "Welcome to"),
            TranscriptParagraph::new("0:03", "the course."),
            TranscriptParagraph::new("0:07", "Let's begin."),
            TranscriptParagraph::new("0:10", "First we"),
            TranscriptParagraph::new("0:12", "install things"),
        ];

        let cues = merge_transcript(&paragraphs);
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0].text, "Welcome to the course.");
        assert_eq!(label_of(&cues[0]), "0:00");
        assert_eq!(cues[1].text, "Let's begin.");
        assert_eq!(label_of(&cues[1]), "0:07");
        assert_eq!(cues[2].text, "First we install things");
        assert_eq!(label_of(&cues[2]), "0:10");
    }

    #[test]
    fn test_merge_drops_empty_entries() {
        let paragraphs = vec![
            TranscriptParagraph::new("", "orphan text."),
            TranscriptParagraph::new("0:05", ""),
            TranscriptParagraph::new("0:06", "  ."),
        ];

        let cues = merge_transcript(&paragraphs);
        assert_eq!(cues.len(), 1);
        assert_eq!(label_of(&cues[0]), "0:05");
        assert_eq!(cues[0].text, ".");
    }

    #[test]
    fn test_merge_takes_first_non_empty_label() {
        let paragraphs = vec![
            TranscriptParagraph::new("", "Starts"),
            TranscriptParagraph::new("0:04", "late."),
        ];

        let cues = merge_transcript(&paragraphs);
        assert_eq!(cues.len(), 1);
        assert_eq!(label_of(&cues[0]), "0:04");
        assert_eq!(cues[0].text, "Starts late.");
    }

    #[tokio::test]
    async fn test_empty_transcript_is_unavailable() {
        let source = TranscriptSource::new(Vec::new());
        assert!(source.extract("en").await.unwrap().is_empty());
        assert_eq!(source.available_subtitles().len(), 1);
    }
}
