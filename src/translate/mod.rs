// Batch translation pipeline
//
// - Segment: group cues into sentences and keep the cue -> sentence lookup
// - Batch: pack sentences into one request with a sentinel marker and split the reply
// - Client: the remote translation endpoint
// - Cache: translations keyed by source text, and the per-cue mapping used during playback

pub mod batch;
pub mod cache;
pub mod client;
pub mod segment;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub use batch::*;
pub use cache::*;
pub use client::*;
pub use segment::*;
use crate::config::TranslateConfig;
use crate::error::Result;

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a text from the configured source language to `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the default translator backed by the web endpoint
    pub fn create_translator(config: TranslateConfig) -> Result<Arc<dyn Translator>> {
        Ok(Arc::new(GoogleTranslateClient::new(config)?))
    }
}

/// Translate sentences with a single request, one result per returned segment
pub async fn translate_sentences(
    translator: &dyn Translator,
    sentences: &[&str],
    target_language: &str,
) -> Result<Vec<String>> {
    if sentences.is_empty() {
        return Ok(Vec::new());
    }

    let request = join_batch(sentences);
    info!("Translating {} sentences to {}", sentences.len(), target_language);
    debug!("Batch request: {}", request);

    let translated = translator.translate(&request, target_language).await?;
    let segments = split_batch(&translated);
    info!("Received {} translated segments", segments.len());

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_translate_sentences_single_request() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .with(eq("Hello. z~~~z Bye."), eq("vi"))
            .times(1)
            .returning(|_, _| Ok("Xin chào. Z~~~Z Tạm biệt.".to_string()));

        let segments = translate_sentences(&translator, &["Hello.", "Bye."], "vi").await.unwrap();
        assert_eq!(segments, vec!["Xin chào.", "Tạm biệt."]);
    }

    #[tokio::test]
    async fn test_translate_sentences_skips_empty_batch() {
        let mut translator = MockTranslator::new();
        translator.expect_translate().never();

        let segments = translate_sentences(&translator, &[], "vi").await.unwrap();
        assert!(segments.is_empty());
    }
}
