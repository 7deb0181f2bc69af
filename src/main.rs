//! Dualcap - bilingual captions for online course videos
//!
//! Command line host for the caption engine. Pages are read from JSON
//! snapshots and the video clock is simulated.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dualcap::cli::{Args, Commands, ConfigAction};
use dualcap::config::Config;
use dualcap::cue::CueAnchor;
use dualcap::overlay::ConsoleOverlay;
use dualcap::session::{Command, Session, SessionPorts};
use dualcap::settings::{FileSettingsStore, SettingsStore, SpeechSettingsPatch};
use dualcap::source::{CueSource, CueSourceFactory, PageSnapshot};
use dualcap::speech::{spawn_event_pump, CommandSpeechEngine, LogSpeechEngine, SpeechEngine};
use dualcap::sync::SimulatedClock;
use dualcap::translate::TranslatorFactory;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("dualcap.toml").exists() {
                info!("Found dualcap.toml in current directory, loading...");
                Config::from_file("dualcap.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Subtitles { page } => {
            let snapshot = PageSnapshot::from_file(&page).await?;
            let source = CueSourceFactory::from_snapshot(snapshot, &config.sync)?;
            let subtitles = source.available_subtitles();

            if subtitles.is_empty() {
                println!("No subtitles available on this page.");
            } else {
                println!("\n{:<10} {:<30} {:<12}", "Language", "Label", "Kind");
                println!("{}", "-".repeat(52));
                for track in subtitles {
                    println!("{:<10} {:<30} {:<12?}", track.language, track.label, track.kind);
                }
            }
        }
        Commands::Translate { page, lang, native } => {
            let mut session = build_session(&config, &page, Arc::new(SimulatedClock::new(0.0, 1.0)), false).await?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} [{elapsed_precise}]")?,
            );
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message(format!("Translating subtitles to {}", lang));

            let mode = session.start_translation(&lang, native).await;
            session.wait_for_translation().await;
            spinner.finish_and_clear();

            if !mode.is_active() {
                println!("No usable subtitles for {} on this page.", lang);
                return Ok(());
            }

            let playback = session.playback();
            let playback = playback.read().await;
            for (index, cue) in playback.cues.iter().enumerate() {
                let at = match &cue.anchor {
                    CueAnchor::Range { start, .. } => format_timestamp(*start),
                    CueAnchor::Label(label) => label.to_string(),
                };
                println!("[{}] {}", at, cue.text);
                match playback.mapping.lookup(index, cue) {
                    Some(text) => println!("{:>width$} {}", "", text, width = at.len() + 2),
                    None => println!("{:>width$} -", "", width = at.len() + 2),
                }
            }
            drop(playback);

            session.stop_translation().await;
        }
        Commands::Play { page, lang, native, from, speed, duration, speak } => {
            let clock = Arc::new(SimulatedClock::new(from, speed));
            let mut session = build_session(&config, &page, clock.clone(), speak).await?;
            if speak {
                // Enabled for this run only, the saved settings are left alone
                let patch = SpeechSettingsPatch { enabled: Some(true), ..Default::default() };
                session.speech().lock().await.update(&patch);
            }

            let mode = session.start_translation(&lang, native).await;
            if !mode.is_active() {
                println!("No usable subtitles for {} on this page.", lang);
                return Ok(());
            }
            // Activation waits for the page to settle; playback starts afterwards
            clock.restart();
            info!("Playing from {} at {}x for {}s ({:?})", format_timestamp(from), speed, duration, mode);

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(duration)) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }

            session.stop_translation().await;
        }
        Commands::Run { page, commands } => {
            let mut session = build_session(&config, &page, Arc::new(SimulatedClock::new(0.0, 1.0)), false).await?;

            let file = tokio::fs::File::open(&commands).await?;
            let mut lines = tokio::io::BufReader::new(file).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                let command: Command = match serde_json::from_str(line) {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("Skipping malformed command {:?}: {}", line, e);
                        continue;
                    }
                };

                let response = session.handle(command).await;
                session.wait_for_translation().await;
                println!("{}", serde_json::to_string(&response)?);
            }

            session.stop_translation().await;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { output } => {
                config.save_to_file(&output)?;
                println!("Configuration written to {}", output.display());
            }
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Settings => {
                let store = FileSettingsStore::new(&config.settings_path);
                let settings = store.load()?;
                println!("# {}", store.path().display());
                println!("{}", toml::to_string_pretty(&settings)?);
            }
        },
    }

    Ok(())
}

/// Wire a session to a page snapshot and the console host
async fn build_session(config: &Config, page: &Path, clock: Arc<SimulatedClock>, speak: bool) -> Result<Session> {
    let snapshot = PageSnapshot::from_file(page).await?;
    info!("Loaded page snapshot for {}", snapshot.url);

    let source = CueSourceFactory::from_snapshot(snapshot, &config.sync)?;
    let translator = TranslatorFactory::create_translator(config.translate.clone())?;
    let store = Arc::new(FileSettingsStore::new(&config.settings_path));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let speech_engine: Arc<dyn SpeechEngine> = if speak {
        let engine = CommandSpeechEngine::new(config.speech.clone(), events_tx);
        match engine.check_availability().await {
            Ok(()) => {
                if let Err(e) = engine.load_voices().await {
                    warn!("No voice list, speaking with the language default: {}", e);
                }
                Arc::new(engine)
            }
            Err(e) => {
                warn!("Speech engine unavailable, logging utterances instead: {}", e);
                Arc::new(LogSpeechEngine)
            }
        }
    } else {
        Arc::new(LogSpeechEngine)
    };

    let session = Session::new(
        config.clone(),
        SessionPorts {
            source,
            translator,
            overlay: Arc::new(ConsoleOverlay::new()),
            clock,
            speech_engine,
            store,
        },
    );
    let _ = spawn_event_pump(session.speech(), events_rx);

    Ok(session)
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".dualcap").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "dualcap.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Captions go to stdout, so the console layer writes to stderr
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("dualcap.log").display());

    Ok(())
}

/// Format a video position as m:ss or h:mm:ss
fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    if total < 3600 {
        format!("{}:{:02}", total / 60, total % 60)
    } else {
        format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
    }
}
