use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{DualcapError, Result};
use super::Translator;

/// Client for the public web translation endpoint
pub struct GoogleTranslateClient {
    client: Client,
    config: TranslateConfig,
}

impl GoogleTranslateClient {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        debug!(
            "Sending translation request to {} ({} chars, {} -> {})",
            self.config.endpoint,
            text.len(),
            self.config.source_language,
            target_language
        );

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("client", self.config.client.as_str()),
                ("sl", self.config.source_language.as_str()),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| DualcapError::Translation(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::NOT_MODIFIED {
            return Err(DualcapError::Translation(format!(
                "Translation endpoint returned {}", status
            )));
        }

        let body = response.text().await?;
        parse_translation_response(&body)
    }
}

/// Concatenate the translated fragments of a nested-array response.
///
/// The response looks like `[[["fragment", "source", ...], ...], ...]`; the
/// first field of every entry in the first element is a translated fragment.
pub fn parse_translation_response(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DualcapError::Translation(format!("Failed to parse response: {}", e)))?;

    let fragments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| DualcapError::Translation("Response has no fragment list".to_string()))?;

    let mut translated = String::new();
    for fragment in fragments {
        if let Some(text) = fragment.get(0).and_then(Value::as_str) {
            translated.push_str(text);
        }
    }

    Ok(translated)
}
