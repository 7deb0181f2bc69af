use serde::{Deserialize, Serialize};
use std::fmt;

/// A source-language text fragment anchored to the video timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub anchor: CueAnchor,
    pub text: String,
}

/// Where a cue sits on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CueAnchor {
    /// Timed-track cue covering `[start, end]` seconds
    Range { start: f64, end: f64 },
    /// Transcript entry starting at a displayed time label
    Label(TimeLabel),
}

impl Cue {
    pub fn timed<S: Into<String>>(start: f64, end: f64, text: S) -> Self {
        Self {
            anchor: CueAnchor::Range { start, end },
            text: text.into(),
        }
    }

    pub fn labelled<S: Into<String>>(label: TimeLabel, text: S) -> Self {
        Self {
            anchor: CueAnchor::Label(label),
            text: text.into(),
        }
    }

    /// Whether the cue text closes a sentence
    pub fn ends_sentence(&self) -> bool {
        self.text.trim_end().ends_with('.')
    }
}

/// Transcript time label such as `1:05` or `1:02:03`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLabel {
    pub raw: String,
    /// Parsed offset in seconds, `None` when the label is malformed
    pub seconds: Option<f64>,
}

impl TimeLabel {
    pub fn parse<S: Into<String>>(raw: S) -> Self {
        let raw = raw.into();
        let seconds = parse_time_label(&raw);
        Self { raw, seconds }
    }
}

impl fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse `m:ss` or `h:mm:ss` into seconds
fn parse_time_label(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let mut total = 0.0;
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

/// Kind of native text track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Subtitles,
    Captions,
    Descriptions,
    Chapters,
    Metadata,
}

impl TrackKind {
    /// Tracks carrying spoken text
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Subtitles | Self::Captions)
    }
}

/// Subtitle track advertised to the settings surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub language: String,
    pub label: String,
    pub kind: TrackKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_label() {
        assert_eq!(TimeLabel::parse("0:00").seconds, Some(0.0));
        assert_eq!(TimeLabel::parse("0:05").seconds, Some(5.0));
        assert_eq!(TimeLabel::parse("2:30").seconds, Some(150.0));
        assert_eq!(TimeLabel::parse("1:02:03").seconds, Some(3723.0));
    }

    #[test]
    fn test_malformed_time_label() {
        assert_eq!(TimeLabel::parse("").seconds, None);
        assert_eq!(TimeLabel::parse("12").seconds, None);
        assert_eq!(TimeLabel::parse("a:b").seconds, None);
        assert_eq!(TimeLabel::parse("1:2:3:4").seconds, None);
    }

    #[test]
    fn test_ends_sentence() {
        assert!(Cue::timed(0.0, 1.0, "Hello there.").ends_sentence());
        assert!(Cue::timed(0.0, 1.0, "Hello there.  \n").ends_sentence());
        assert!(!Cue::timed(0.0, 1.0, "e.g. this").ends_sentence());
        assert!(!Cue::timed(0.0, 1.0, "Really?").ends_sentence());
    }

    #[test]
    fn test_textual_track_kinds() {
        assert!(TrackKind::Subtitles.is_textual());
        assert!(TrackKind::Captions.is_textual());
        assert!(!TrackKind::Chapters.is_textual());
    }
}
