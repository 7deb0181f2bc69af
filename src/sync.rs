//! Playback synchronization.
//!
//! A recurring timer reads the video clock, picks the cue active at that time,
//! and pushes its resolved text to the overlay and the speech sink. Polling is
//! used instead of player time events so every host player behaves the same.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cue::{Cue, CueAnchor};
use crate::overlay::CaptionOverlay;
use crate::source::SourceKind;
use crate::speech::SharedSpeech;
use crate::translate::Mapping;

/// Source of the current playback position
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackClock: Send + Sync {
    /// Current video time in seconds, `None` when no video is present
    fn current_time(&self) -> Option<f64>;
}

/// Clock advancing from a start position at a fixed playback speed
pub struct SimulatedClock {
    origin: StdMutex<Instant>,
    start: f64,
    speed: f64,
}

impl SimulatedClock {
    pub fn new(start: f64, speed: f64) -> Self {
        Self {
            origin: StdMutex::new(Instant::now()),
            start,
            speed,
        }
    }

    /// Rewind to the start position as of now
    pub fn restart(&self) {
        if let Ok(mut origin) = self.origin.lock() {
            *origin = Instant::now();
        }
    }

    pub fn position(&self) -> f64 {
        let elapsed = self
            .origin
            .lock()
            .map(|origin| origin.elapsed().as_secs_f64())
            .unwrap_or_default();
        self.start + elapsed * self.speed
    }
}

impl PlaybackClock for SimulatedClock {
    fn current_time(&self) -> Option<f64> {
        Some(self.position())
    }
}

/// First cue whose `[start, end]` range contains `time`
pub fn select_in_range(cues: &[Cue], time: f64) -> Option<usize> {
    cues.iter().position(|cue| match cue.anchor {
        CueAnchor::Range { start, end } => time >= start && time <= end,
        CueAnchor::Label(_) => false,
    })
}

/// Last cue whose time label is not in the future
pub fn select_latest(cues: &[Cue], time: f64) -> Option<usize> {
    cues.iter()
        .enumerate()
        .filter(|(_, cue)| match &cue.anchor {
            CueAnchor::Label(label) => label.seconds.is_some_and(|seconds| time >= seconds),
            CueAnchor::Range { start, .. } => time >= *start,
        })
        .map(|(idx, _)| idx)
        .last()
}

/// Cues and their resolved texts for the active overlay
#[derive(Debug, Clone)]
pub struct Playback {
    pub kind: SourceKind,
    pub cues: Vec<Cue>,
    pub mapping: Mapping,
}

pub type SharedPlayback = Arc<RwLock<Playback>>;

impl Playback {
    pub fn new(kind: SourceKind, cues: Vec<Cue>, mapping: Mapping) -> Self {
        Self { kind, cues, mapping }
    }

    pub fn empty() -> Self {
        Self::new(SourceKind::TimedTrack, Vec::new(), Mapping::Empty)
    }

    pub fn shared(self) -> SharedPlayback {
        Arc::new(RwLock::new(self))
    }

    /// Index of the cue active at `time`
    pub fn active(&self, time: f64) -> Option<usize> {
        match self.kind {
            SourceKind::TimedTrack => select_in_range(&self.cues, time),
            SourceKind::Transcript => select_latest(&self.cues, time),
        }
    }

    /// Active cue index and the text to display for it
    pub fn resolve(&self, time: f64) -> Option<(usize, String)> {
        let index = self.active(time)?;
        let cue = &self.cues[index];
        self.mapping
            .lookup(index, cue)
            .map(|text| (index, text.to_string()))
    }
}

/// Collaborators a running synchronizer drives
#[derive(Clone)]
pub struct SyncContext {
    pub clock: Arc<dyn PlaybackClock>,
    pub playback: SharedPlayback,
    pub overlay: Arc<dyn CaptionOverlay>,
    pub speech: SharedSpeech,
}

/// Run one synchronization step; returns the cue index now displayed
pub async fn tick(ctx: &SyncContext, current: Option<usize>) -> Option<usize> {
    let Some(time) = ctx.clock.current_time() else {
        return current;
    };

    let resolved = ctx.playback.read().await.resolve(time);
    match resolved {
        Some((index, text)) => {
            if current != Some(index) {
                debug!("Cue {} active at {:.2}s", index, time);
            }
            ctx.overlay.show(&text);
            ctx.speech.lock().await.speak(&text);
            Some(index)
        }
        None => {
            ctx.overlay.clear();
            None
        }
    }
}

/// Owner of the single polling timer for one overlay
#[derive(Default)]
pub struct Synchronizer {
    handle: Option<JoinHandle<()>>,
    context: Option<SyncContext>,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling every `interval`, replacing any running timer
    pub fn start(&mut self, interval: Duration, ctx: SyncContext) {
        if let Some(handle) = self.handle.take() {
            debug!("Replacing running synchronizer");
            handle.abort();
        }

        info!("Starting synchronizer every {:?}", interval);
        let task_ctx = ctx.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut current = None;
            loop {
                ticker.tick().await;
                current = tick(&task_ctx, current).await;
            }
        }));
        self.context = Some(ctx);
    }

    /// Stop polling and clear any caption or speech left behind
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Synchronizer stopped");
        }

        if let Some(ctx) = self.context.take() {
            ctx.overlay.clear();
            ctx.speech.lock().await.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::TimeLabel;
    use crate::overlay::MockCaptionOverlay;
    use crate::settings::SpeechSettings;
    use crate::speech::{MockSpeechEngine, SpeechSink};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn timed() -> Vec<Cue> {
        vec![Cue::timed(0.0, 2.0, "A"), Cue::timed(2.0, 5.0, "B")]
    }

    fn transcript() -> Vec<Cue> {
        vec![
            Cue::labelled(TimeLabel::parse("0:00"), "A"),
            Cue::labelled(TimeLabel::parse("0:05"), "B"),
            Cue::labelled(TimeLabel::parse("0:12"), "C"),
        ]
    }

    #[test]
    fn test_timed_selection() {
        let cues = timed();
        assert_eq!(select_in_range(&cues, 1.0), Some(0));
        assert_eq!(select_in_range(&cues, 3.0), Some(1));
        assert_eq!(select_in_range(&cues, 5.0), Some(1));
        assert_eq!(select_in_range(&cues, 10.0), None);
    }

    #[test]
    fn test_timed_selection_first_match_wins_on_overlap() {
        let cues = vec![Cue::timed(0.0, 3.0, "A"), Cue::timed(1.0, 4.0, "B")];
        assert_eq!(select_in_range(&cues, 2.0), Some(0));
    }

    #[test]
    fn test_transcript_selection() {
        let cues = transcript();
        assert_eq!(select_latest(&cues, 7.0), Some(1));
        assert_eq!(select_latest(&cues, 0.0), Some(0));
        assert_eq!(select_latest(&cues, -1.0), None);
        assert_eq!(select_latest(&cues, 100.0), Some(2));
    }

    #[test]
    fn test_transcript_selection_skips_malformed_labels() {
        let cues = vec![
            Cue::labelled(TimeLabel::parse("0:00"), "A"),
            Cue::labelled(TimeLabel::parse("soon"), "B"),
        ];
        assert_eq!(select_latest(&cues, 30.0), Some(0));
    }

    #[test]
    fn test_resolve_requires_mapping_entry() {
        let playback = Playback::new(SourceKind::TimedTrack, timed(), Mapping::Empty);
        assert_eq!(playback.resolve(1.0), None);

        let passthrough = Playback::new(SourceKind::TimedTrack, timed(), Mapping::Passthrough);
        assert_eq!(passthrough.resolve(3.0), Some((1, "B".to_string())));
    }

    struct FixedClock(StdMutex<Option<f64>>, AtomicUsize);

    impl FixedClock {
        fn new(time: Option<f64>) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(time), AtomicUsize::new(0)))
        }

        fn set(&self, time: Option<f64>) {
            *self.0.lock().unwrap() = time;
        }

        fn reads(&self) -> usize {
            self.1.load(Ordering::SeqCst)
        }
    }

    impl PlaybackClock for FixedClock {
        fn current_time(&self) -> Option<f64> {
            self.1.fetch_add(1, Ordering::SeqCst);
            *self.0.lock().unwrap()
        }
    }

    fn silent_speech() -> SharedSpeech {
        let mut engine = MockSpeechEngine::new();
        engine.expect_voices().returning(Vec::new);
        engine.expect_speak().never();
        SpeechSink::new(Arc::new(engine), SpeechSettings::default(), "vi").shared()
    }

    #[tokio::test]
    async fn test_tick_shows_then_clears() {
        let clock = FixedClock::new(Some(1.0));
        let mut overlay = MockCaptionOverlay::new();
        overlay.expect_show().withf(|text| text == "A").times(1).return_const(());
        overlay.expect_clear().times(1).return_const(());

        let ctx = SyncContext {
            clock: clock.clone(),
            playback: Playback::new(SourceKind::TimedTrack, timed(), Mapping::Passthrough).shared(),
            overlay: Arc::new(overlay),
            speech: silent_speech(),
        };

        let current = tick(&ctx, None).await;
        assert_eq!(current, Some(0));

        clock.set(Some(10.0));
        assert_eq!(tick(&ctx, current).await, None);
    }

    #[tokio::test]
    async fn test_tick_without_video_is_skipped() {
        let mut overlay = MockCaptionOverlay::new();
        overlay.expect_show().never();
        overlay.expect_clear().never();

        let ctx = SyncContext {
            clock: FixedClock::new(None),
            playback: Playback::new(SourceKind::TimedTrack, timed(), Mapping::Passthrough).shared(),
            overlay: Arc::new(overlay),
            speech: silent_speech(),
        };

        assert_eq!(tick(&ctx, Some(1)).await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_clock_speed() {
        let clock = SimulatedClock::new(30.0, 2.0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.current_time(), Some(40.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_clock_restart() {
        let clock = SimulatedClock::new(30.0, 1.0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        clock.restart();
        assert_eq!(clock.position(), 30.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(clock.position(), 31.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_single_timer() {
        let clock = FixedClock::new(Some(100.0));
        let mut overlay = MockCaptionOverlay::new();
        overlay.expect_clear().return_const(());

        let ctx = SyncContext {
            clock: clock.clone(),
            playback: Playback::empty().shared(),
            overlay: Arc::new(overlay),
            speech: silent_speech(),
        };

        let mut synchronizer = Synchronizer::new();
        synchronizer.start(Duration::from_millis(100), ctx.clone());
        synchronizer.start(Duration::from_millis(100), ctx);
        assert!(synchronizer.is_running());

        tokio::time::sleep(Duration::from_millis(1050)).await;
        let reads = clock.reads();
        // one timer fires 11 times in 1.05s (t = 0, 100, ..., 1000)
        assert!((10..=12).contains(&reads), "unexpected tick count {}", reads);

        synchronizer.stop().await;
        assert!(!synchronizer.is_running());
        let after_stop = clock.reads();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(clock.reads(), after_stop);
    }
}
