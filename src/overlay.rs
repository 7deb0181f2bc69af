//! Caption rendering port.
//!
//! The overlay is whatever draws the caption box over the video. The engine
//! only tells it what text to show and how to style it.

use std::sync::Mutex;
use tracing::{debug, info};

use crate::settings::{CaptionPosition, CaptionSettings};

/// Main trait for caption rendering
#[cfg_attr(test, mockall::automock)]
pub trait CaptionOverlay: Send + Sync {
    /// Create (or recreate) the caption element
    fn create(&self, style: &CaptionSettings);

    /// Display text in the caption element
    fn show(&self, text: &str);

    /// Empty the caption element
    fn clear(&self);

    /// Show or hide the caption element without touching its content
    fn set_visible(&self, visible: bool);

    /// Apply font and color settings
    fn apply_style(&self, style: &CaptionSettings);

    /// Move the caption element
    fn set_position(&self, position: CaptionPosition);

    /// Hide the host player's own captions
    fn hide_native_captions(&self);

    /// Undo `hide_native_captions`
    fn restore_native_captions(&self);

    /// Show or hide the speech control panel, returning whether it is now shown
    fn toggle_speech_panel(&self) -> bool;

    /// Remove the caption element entirely
    fn remove(&self);
}

/// CSS-style background color from hex color and opacity percent
pub fn background_rgba(style: &CaptionSettings) -> String {
    let hex = style.bg_color.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
            .unwrap_or(0)
    };

    format!(
        "rgba({}, {}, {}, {})",
        channel(0..2),
        channel(2..4),
        channel(4..6),
        f64::from(style.bg_opacity.min(100)) / 100.0
    )
}

#[derive(Default)]
struct ConsoleState {
    created: bool,
    visible: bool,
    current: String,
    panel: bool,
}

/// Overlay that prints caption changes to stdout
#[derive(Default)]
pub struct ConsoleOverlay {
    state: Mutex<ConsoleState>,
}

impl ConsoleOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<F: FnOnce(&mut ConsoleState)>(&self, f: F) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

impl CaptionOverlay for ConsoleOverlay {
    fn create(&self, style: &CaptionSettings) {
        self.with_state(|state| {
            state.created = true;
            state.visible = style.visible;
            state.current.clear();
        });
        self.apply_style(style);
    }

    fn show(&self, text: &str) {
        self.with_state(|state| {
            if state.created && state.current != text {
                state.current = text.to_string();
                if state.visible {
                    println!("▶ {}", text);
                }
            }
        });
    }

    fn clear(&self) {
        self.with_state(|state| state.current.clear());
    }

    fn set_visible(&self, visible: bool) {
        self.with_state(|state| state.visible = visible);
        info!("Caption visibility changed: {}", visible);
    }

    fn apply_style(&self, style: &CaptionSettings) {
        debug!(
            "Caption style: {}px, text {}, background {}",
            style.font_size,
            style.text_color,
            background_rgba(style)
        );
    }

    fn set_position(&self, position: CaptionPosition) {
        debug!("Caption moved to ({}, {})", position.x, position.y);
    }

    fn hide_native_captions(&self) {
        debug!("Native captions hidden");
    }

    fn restore_native_captions(&self) {
        debug!("Native captions restored");
    }

    fn toggle_speech_panel(&self) -> bool {
        let mut shown = false;
        self.with_state(|state| {
            state.panel = !state.panel;
            shown = state.panel;
        });
        shown
    }

    fn remove(&self) {
        self.with_state(|state| {
            state.created = false;
            state.current.clear();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_rgba() {
        let mut style = CaptionSettings::default();
        assert_eq!(background_rgba(&style), "rgba(0, 0, 0, 0.7)");

        style.bg_color = "#1E80E2".to_string();
        style.bg_opacity = 100;
        assert_eq!(background_rgba(&style), "rgba(30, 128, 226, 1)");
    }

    #[test]
    fn test_background_rgba_malformed_color() {
        let mut style = CaptionSettings::default();
        style.bg_color = "red".to_string();
        style.bg_opacity = 0;
        assert_eq!(background_rgba(&style), "rgba(0, 0, 0, 0)");
    }

    #[test]
    fn test_console_speech_panel_toggle() {
        let overlay = ConsoleOverlay::new();
        assert!(overlay.toggle_speech_panel());
        assert!(!overlay.toggle_speech_panel());
    }
}
