use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the subtitle tracks offered by a page snapshot
    Subtitles {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,
    },

    /// Translate a page's subtitles and print them next to the originals
    Translate {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,

        /// Target language
        #[arg(short, long, default_value = "vi")]
        lang: String,

        /// Show the page's own track for the language instead of translating
        #[arg(long)]
        native: bool,
    },

    /// Play back a page snapshot on a simulated clock, printing captions as they change
    Play {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,

        /// Target language
        #[arg(short, long, default_value = "vi")]
        lang: String,

        /// Show the page's own track for the language instead of translating
        #[arg(long)]
        native: bool,

        /// Start position in seconds
        #[arg(long, default_value = "0")]
        from: f64,

        /// Playback speed multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// How long to play, in seconds
        #[arg(short, long, default_value = "30")]
        duration: u64,

        /// Read captions aloud with the configured speech engine
        #[arg(long)]
        speak: bool,
    },

    /// Run a file of JSON commands (one per line) against a page snapshot
    Run {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,

        /// Command file
        #[arg(short = 'f', long)]
        commands: PathBuf,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Destination file
        #[arg(short, long, default_value = "dualcap.toml")]
        output: PathBuf,
    },

    /// Print the effective configuration
    Show,

    /// Print the saved user settings
    Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play_defaults() {
        let args = Args::parse_from(["dualcap", "play", "--page", "page.json"]);
        match args.command {
            Commands::Play { lang, native, from, speed, duration, speak, .. } => {
                assert_eq!(lang, "vi");
                assert!(!native);
                assert_eq!(from, 0.0);
                assert_eq!(speed, 1.0);
                assert_eq!(duration, 30);
                assert!(!speak);
            }
            _ => panic!("expected play command"),
        }
    }

    #[test]
    fn test_parse_translate_native() {
        let args = Args::parse_from(["dualcap", "-v", "translate", "-p", "page.json", "-l", "es", "--native"]);
        assert!(args.verbose);
        match args.command {
            Commands::Translate { page, lang, native } => {
                assert_eq!(page, PathBuf::from("page.json"));
                assert_eq!(lang, "es");
                assert!(native);
            }
            _ => panic!("expected translate command"),
        }
    }
}
