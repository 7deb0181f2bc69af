use std::collections::HashMap;
use tracing::{debug, warn};

use crate::cue::Cue;
use super::segment::Segmentation;

/// Source text to translated text, scoped to one target language
#[derive(Debug, Clone, Default)]
pub struct TranslationCache {
    target_language: String,
    entries: HashMap<String, String>,
}

impl TranslationCache {
    pub fn new<S: Into<String>>(target_language: S) -> Self {
        Self {
            target_language: target_language.into(),
            entries: HashMap::new(),
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Drop all entries when the target language changes
    pub fn retarget(&mut self, target_language: &str) {
        if self.target_language != target_language {
            debug!(
                "Translation cache retargeted {} -> {}, dropping {} entries",
                self.target_language,
                target_language,
                self.entries.len()
            );
            self.target_language = target_language.to_string();
            self.entries.clear();
        }
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn insert<S: Into<String>, T: Into<String>>(&mut self, source: S, translation: T) {
        self.entries.insert(source.into(), translation.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source texts not yet cached, deduplicated, in first-seen order.
    ///
    /// Blank texts are never worth a request and are left out.
    pub fn missing<'a>(&self, sources: &[&'a str]) -> Vec<&'a str> {
        let mut seen = std::collections::HashSet::new();
        sources
            .iter()
            .copied()
            .filter(|source| !source.trim().is_empty())
            .filter(|source| !self.contains(source) && seen.insert(*source))
            .collect()
    }

    /// Record a batch response positionally against the texts that were sent.
    ///
    /// Sources past the end of `translations` stay uncached; empty translations
    /// are not recorded.
    pub fn record(&mut self, sources: &[&str], translations: &[String]) {
        if translations.len() != sources.len() {
            warn!(
                "Translation returned {} segments for {} sentences",
                translations.len(),
                sources.len()
            );
        }

        for (source, translation) in sources.iter().zip(translations) {
            if !translation.is_empty() {
                self.insert(*source, translation.clone());
            }
        }
    }
}

/// Resolved association from a cue to the text shown for it
#[derive(Debug, Clone, Default)]
pub enum Mapping {
    /// Nothing resolved yet
    #[default]
    Empty,
    /// Show the source cue text unchanged
    Passthrough,
    /// Cue index to translation, every cue of a group sharing its sentence
    ByIndex(HashMap<usize, String>),
    /// Source text to translation
    ByText(TranslationCache),
}

impl Mapping {
    /// Expand cached sentence translations onto every cue of each group
    pub fn index_keyed_from_cache(segmentation: &Segmentation, cache: &TranslationCache) -> Self {
        let mut mapping = HashMap::new();
        for group in &segmentation.groups {
            let Some(translation) = cache.get(&group.text).filter(|t| !t.is_empty()) else {
                continue;
            };
            for cue in group.cues.clone() {
                mapping.insert(cue, translation.to_string());
            }
        }
        Self::ByIndex(mapping)
    }

    /// Text shown for the cue at `index`, if any
    pub fn lookup<'a>(&'a self, index: usize, cue: &'a Cue) -> Option<&'a str> {
        let text = match self {
            Self::Empty => None,
            Self::Passthrough => Some(cue.text.as_str()),
            Self::ByIndex(mapping) => mapping.get(&index).map(String::as_str),
            Self::ByText(cache) => cache.get(&cue.text),
        };
        text.filter(|text| !text.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Empty | Self::Passthrough => 0,
            Self::ByIndex(mapping) => mapping.len(),
            Self::ByText(cache) => cache.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
