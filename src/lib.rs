//! Dualcap - bilingual captions for online course videos
//!
//! Extracts a video's subtitles, translates them sentence by sentence in a
//! single batched request, and keeps a caption overlay (and optional speech)
//! in step with the playback clock.

pub mod cli;
pub mod config;
pub mod cue;
pub mod error;
pub mod overlay;
pub mod session;
pub mod settings;
pub mod source;
pub mod speech;
pub mod sync;
pub mod translate;
