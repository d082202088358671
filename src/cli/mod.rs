use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "subtrans",
    about = "Subtitle Translator - Download YouTube captions, translate them and generate speech",
    version,
    long_about = "Fetches a video's caption track, rebuilds it into readable paragraphs, translates it with an OpenAI-compatible backend and optionally synthesizes the translation to MP3. Results are cached per video."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch (and translate) subtitles for a video
    Get {
        /// YouTube URL or 11 character video ID
        #[arg(value_name = "URL_OR_ID")]
        video: String,

        /// Target language (defaults to app.default_language)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Generate speech audio for translated subtitles
        #[arg(long)]
        tts: bool,

        /// Netscape-format cookie jar sent with YouTube requests
        #[arg(long, value_name = "FILE", env = "COOKIE_FILE")]
        cookies: Option<PathBuf>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show cached subtitles without touching the network
    Query {
        /// YouTube URL or 11 character video ID
        #[arg(value_name = "URL_OR_ID")]
        video: String,

        /// Language of the cached version (defaults to app.default_language)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// Title header followed by paragraphs
    Text,
    /// JSON document with provenance
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
