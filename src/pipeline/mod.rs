use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheError, SubtitleStore, SubtitleVersion};
use crate::task::{Task, TaskReporter, TaskStatus};
use crate::transcript::{
    extract_video_id, join_paragraphs, parse_cookie_jar, reconstruct, FetchOptions, Transcript, TranscriptError,
    TranscriptSource,
};
use crate::translate::{Translate, TranslationError};
use crate::tts::Synthesize;

/// Caption language tried when the requested one is not published
pub const FALLBACK_LANGUAGE: &str = "en";

const PROGRESS_STARTED: u8 = 10;
const PROGRESS_DOWNLOADED: u8 = 20;
const PROGRESS_TRANSLATING: u8 = 50;
const PROGRESS_GENERATING_AUDIO: u8 = 80;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Failed to read cookie file {path}: {source}")]
    CookieFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to update task {task_id}: {reason}")]
    Reporter { task_id: String, reason: String },
}

/// One subtitle request as seen by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRequest {
    /// Video URL or bare identifier
    pub video: String,
    pub language: String,
    pub need_tts: bool,
    /// Pre-built `Cookie` header value
    pub cookie_header: Option<String>,
}

impl SubtitleRequest {
    pub fn from_task(task: &Task, cookie_header: Option<String>) -> Self {
        Self {
            video: task.url.clone(),
            language: task.language.clone(),
            need_tts: task.need_tts,
            cookie_header,
        }
    }
}

/// Outcome of a completed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleResult {
    pub video_id: String,
    pub title: String,
    #[serde(flatten)]
    pub version: SubtitleVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

/// Sequences fetch, cache, translation and speech synthesis for a task
pub struct SubtitleManager {
    source: Arc<dyn TranscriptSource>,
    store: Arc<dyn SubtitleStore>,
    reporter: Arc<dyn TaskReporter>,
    translator: Result<Arc<dyn Translate>, TranslationError>,
    synthesizer: Option<Arc<dyn Synthesize>>,
    cookie_file: Option<PathBuf>,
}

impl SubtitleManager {
    pub fn new(
        source: Arc<dyn TranscriptSource>,
        store: Arc<dyn SubtitleStore>,
        reporter: Arc<dyn TaskReporter>,
    ) -> Self {
        Self {
            source,
            store,
            reporter,
            translator: Err(TranslationError::MissingConfig("OpenAI API key")),
            synthesizer: None,
            cookie_file: None,
        }
    }

    /// Translation engine, or the configuration error that prevented building one.
    /// The error only surfaces when a request actually needs translating.
    pub fn with_translator(mut self, translator: Result<Arc<dyn Translate>, TranslationError>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesize>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_cookie_file(mut self, cookie_file: Option<PathBuf>) -> Self {
        self.cookie_file = cookie_file;
        self
    }

    /// Load the configured cookie jar, then run the task end to end
    pub async fn process_task(&self, task: &Task) -> Result<SubtitleResult, PipelineError> {
        let cookie_header = match self.load_cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                self.fail(&task.id, &e).await;
                return Err(e);
            }
        };

        let request = SubtitleRequest::from_task(task, cookie_header);
        self.get(&task.id, &request).await
    }

    /// Produce the requested subtitle version, driving the task record through its states.
    ///
    /// Any error marks the task `FAILED` with the error message and is returned.
    pub async fn get(&self, task_id: &str, request: &SubtitleRequest) -> Result<SubtitleResult, PipelineError> {
        let result = match self.run(task_id, request).await {
            Ok(result) => result,
            Err(e) => {
                self.fail(task_id, &e).await;
                return Err(e);
            }
        };

        self.reporter
            .complete(task_id, &result.title)
            .await
            .map_err(|e| reporter_error(task_id, e))?;

        tracing::info!("Task {} completed: {}", task_id, result.title);
        Ok(result)
    }

    /// Cached version for a video and language; never touches the network
    pub async fn query(&self, video: &str, language: &str) -> Result<Option<SubtitleResult>, PipelineError> {
        let video_id = extract_video_id(video)?;
        let Some((title, version)) = self.store.read(&video_id, language).await else {
            return Ok(None);
        };

        let audio_path = match &self.synthesizer {
            Some(synthesizer) => synthesizer.cached_audio(&video_id).await,
            None => None,
        };

        Ok(Some(SubtitleResult {
            video_id,
            title,
            version,
            audio_path,
        }))
    }

    /// Synthesize speech for arbitrary text under a video's audio path
    pub async fn tts(&self, video_id: &str, text: &str) -> anyhow::Result<PathBuf> {
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No speech backend configured"))?;

        synthesizer.synthesize(video_id, text).await
    }

    async fn run(&self, task_id: &str, request: &SubtitleRequest) -> Result<SubtitleResult, PipelineError> {
        let video_id = extract_video_id(&request.video)?;
        self.report(task_id, TaskStatus::Downloading, PROGRESS_STARTED).await?;

        let (title, version) = match self.store.read(&video_id, &request.language).await {
            Some(cached) => {
                tracing::info!("Found cached {} subtitles for {}", request.language, video_id);
                cached
            }
            None => {
                let (title, source) = self.download(&video_id, request).await?;
                self.report(task_id, TaskStatus::Downloading, PROGRESS_DOWNLOADED).await?;

                if source.language == request.language {
                    (title, source)
                } else {
                    self.report(task_id, TaskStatus::Translating, PROGRESS_TRANSLATING).await?;
                    let version = self.translate(&source, &request.language).await?;
                    self.store.write(&video_id, &title, version.clone()).await?;
                    (title, version)
                }
            }
        };

        let audio_path = if request.need_tts && version.is_translation() {
            self.report(task_id, TaskStatus::GeneratingAudio, PROGRESS_GENERATING_AUDIO)
                .await?;
            self.synthesize(&video_id, &version.subtitle).await
        } else {
            None
        };

        Ok(SubtitleResult {
            video_id,
            title,
            version,
            audio_path,
        })
    }

    /// Fetch the requested language, falling back to English when it is not published
    async fn download(
        &self,
        video_id: &str,
        request: &SubtitleRequest,
    ) -> Result<(String, SubtitleVersion), PipelineError> {
        tracing::info!("Downloading {} subtitles for {}", request.language, video_id);
        let options = FetchOptions::new(Some(request.language.as_str()), request.cookie_header.as_deref());

        let transcript = match self.source.fetch(video_id, &options).await {
            Ok(transcript) => transcript,
            Err(TranscriptError::NotAvailableLanguage { available, .. })
                if request.language != FALLBACK_LANGUAGE =>
            {
                tracing::warn!(
                    "No {} subtitles for {} (available: {}), falling back to {}",
                    request.language,
                    video_id,
                    available.join(", "),
                    FALLBACK_LANGUAGE
                );

                if let Some(cached) = self.store.read(video_id, FALLBACK_LANGUAGE).await {
                    tracing::info!("Found cached {} subtitles for {}", FALLBACK_LANGUAGE, video_id);
                    return Ok(cached);
                }

                let options = FetchOptions::new(Some(FALLBACK_LANGUAGE), request.cookie_header.as_deref());
                self.source.fetch(video_id, &options).await?
            }
            Err(e) => return Err(e.into()),
        };

        self.store_transcript(video_id, transcript).await
    }

    async fn store_transcript(
        &self,
        video_id: &str,
        transcript: Transcript,
    ) -> Result<(String, SubtitleVersion), PipelineError> {
        let paragraphs = reconstruct(&transcript.fragments);
        tracing::debug!(
            "Rebuilt {} fragments into {} paragraphs",
            transcript.fragments.len(),
            paragraphs.len()
        );

        let version = SubtitleVersion {
            subtitle: join_paragraphs(&paragraphs),
            language: transcript.language.clone(),
            original_language: transcript.language,
        };
        self.store.write(video_id, &transcript.title, version.clone()).await?;

        Ok((transcript.title, version))
    }

    async fn translate(&self, source: &SubtitleVersion, language: &str) -> Result<SubtitleVersion, PipelineError> {
        let translator = self.translator.as_ref().map_err(|e| e.clone())?;
        tracing::info!("Translating {} subtitles into {}", source.language, language);

        let subtitle = translator.translate(&source.subtitle, language).await?;
        Ok(SubtitleVersion {
            subtitle,
            language: language.to_string(),
            original_language: source.original_language.clone(),
        })
    }

    /// Speech failures are logged; the task still completes without audio
    async fn synthesize(&self, video_id: &str, text: &str) -> Option<PathBuf> {
        let Some(synthesizer) = &self.synthesizer else {
            tracing::warn!("Audio requested but no speech backend is configured");
            return None;
        };

        match synthesizer.synthesize(video_id, text).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Failed to generate audio for {}: {:#}", video_id, e);
                None
            }
        }
    }

    async fn load_cookies(&self) -> Result<Option<String>, PipelineError> {
        let Some(path) = &self.cookie_file else {
            return Ok(None);
        };

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PipelineError::CookieFile {
                path: path.clone(),
                source,
            })?;

        let header = parse_cookie_jar(&contents);
        tracing::debug!("Loaded cookies from {}", path.display());
        Ok(Some(header).filter(|h| !h.is_empty()))
    }

    async fn report(&self, task_id: &str, status: TaskStatus, progress: u8) -> Result<(), PipelineError> {
        self.reporter
            .update_status(task_id, status, progress)
            .await
            .map_err(|e| reporter_error(task_id, e))
    }

    async fn fail(&self, task_id: &str, error: &PipelineError) {
        tracing::error!("Task {} failed: {}", task_id, error);
        if let Err(e) = self.reporter.fail(task_id, &error.to_string()).await {
            tracing::warn!("Could not mark task {} as failed: {:#}", task_id, e);
        }
    }
}

fn reporter_error(task_id: &str, error: anyhow::Error) -> PipelineError {
    PipelineError::Reporter {
        task_id: task_id.to_string(),
        reason: format!("{:#}", error),
    }
}
