//! Subtitle Translator - fetch YouTube caption tracks, rebuild them into paragraphs,
//! translate them with an OpenAI-compatible backend and synthesize speech.
//!
//! Every processed language is cached per video, so repeated requests never hit
//! the network twice.

pub mod cache;
pub mod cli;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod task;
pub mod transcript;
pub mod translate;
pub mod tts;
pub mod utils;

pub use cache::{CacheEntry, JsonFileCache, SubtitleStore, SubtitleVersion};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use pipeline::{PipelineError, SubtitleManager, SubtitleRequest, SubtitleResult};
pub use task::{MemoryTaskStore, Task, TaskReporter, TaskStatus};
pub use transcript::{Transcript, TranscriptError, TranscriptSource, YoutubeTranscriptFetcher};
pub use translate::{Translate, TranslationEngine, TranslationError};
pub use tts::{Synthesize, TtsPipeline};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
