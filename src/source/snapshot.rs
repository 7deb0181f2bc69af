use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{DualcapError, Result};
use super::{NativeTrack, TranscriptParagraph};

/// Subtitle data scraped from a page by the host, serialized as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub tracks: Vec<NativeTrack>,
    #[serde(default)]
    pub transcript: Vec<TranscriptParagraph>,
}

impl PageSnapshot {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DualcapError::FileNotFound(path.display().to_string()));
        }

        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: PageSnapshot = serde_json::from_str(&content)?;
        info!(
            "Loaded page snapshot {} ({} tracks, {} transcript paragraphs)",
            snapshot.url,
            snapshot.tracks.len(),
            snapshot.transcript.len()
        );
        Ok(snapshot)
    }
}
