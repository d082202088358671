use anyhow::Context;
use async_trait::async_trait;
use base64::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub mod backend;
pub mod transcode;

pub use backend::{HttpSpeechBackend, SpeechBackend};
pub use transcode::{AudioEncoder, FfmpegEncoder, TranscodeError};

/// Weight ceiling of a single synthesis request
pub const MAX_CHUNK_WEIGHT: usize = 450;

/// Weight of a CJK ideograph or full-width punctuation mark
const CJK_WEIGHT: usize = 3;

const AUDIO_EXTENSION: &str = "mp3";

/// CJK ideographs, CJK symbols and punctuation, full-width forms
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3000}'..='\u{303F}' | '\u{FF00}'..='\u{FFEF}')
}

pub fn count_cjk_chars(text: &str) -> usize {
    text.chars().filter(|c| is_cjk(*c)).count()
}

fn char_weight(c: char) -> usize {
    if is_cjk(c) {
        CJK_WEIGHT
    } else {
        1
    }
}

/// Split text into chunks whose weight stays below [`MAX_CHUNK_WEIGHT`].
///
/// Lossless: concatenating the chunks reproduces the input exactly.
pub fn split_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut weight = 0usize;

    for c in text.chars() {
        let w = char_weight(c);
        if weight + w >= MAX_CHUNK_WEIGHT && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            weight = 0;
        }
        current.push(c);
        weight += w;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Produces an audio file for a video's subtitle text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesize: Send + Sync {
    async fn synthesize(&self, video_id: &str, text: &str) -> anyhow::Result<PathBuf>;

    /// Audio file that already exists for this video
    async fn cached_audio(&self, video_id: &str) -> Option<PathBuf>;
}

/// Chunked synthesis, PCM concatenation and encoding
pub struct TtsPipeline {
    backend: Arc<dyn SpeechBackend>,
    encoder: Arc<dyn AudioEncoder>,
    audio_dir: PathBuf,
}

impl TtsPipeline {
    pub fn new(backend: Arc<dyn SpeechBackend>, encoder: Arc<dyn AudioEncoder>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            encoder,
            audio_dir: audio_dir.into(),
        }
    }

    /// Deterministic output location for a video
    pub fn audio_path(&self, video_id: &str) -> PathBuf {
        self.audio_dir.join(format!(
            "{}.{}",
            crate::utils::sanitize_filename(video_id),
            AUDIO_EXTENSION
        ))
    }
}

/// Dump raw PCM into a temp file inside `dir`; removed when the handle is closed
fn write_pcm(dir: &Path, prefix: &str, pcm: &[u8]) -> anyhow::Result<tempfile::NamedTempFile> {
    fs_err::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".pcm")
        .tempfile_in(dir)
        .context("Failed to create temporary PCM file")?;
    file.write_all(pcm)?;
    Ok(file)
}

#[async_trait]
impl Synthesize for TtsPipeline {
    async fn synthesize(&self, video_id: &str, text: &str) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.cached_audio(video_id).await {
            tracing::info!("Using cached audio {}", path.display());
            return Ok(path);
        }

        let chunks = split_text(text);
        if chunks.is_empty() {
            anyhow::bail!("Nothing to synthesize for {}", video_id);
        }

        let session_id = Uuid::new_v4().to_string();
        let mut pcm = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            tracing::info!("Synthesizing chunk {}/{}", index + 1, chunks.len());
            let audio = self.backend.synthesize(chunk, &session_id).await?;
            let bytes = BASE64_STANDARD
                .decode(audio.trim())
                .context("Speech backend returned invalid base64 audio")?;
            pcm.extend_from_slice(&bytes);
        }

        let output = self.audio_path(video_id);
        let audio_dir = self.audio_dir.clone();
        let prefix = format!("{}-", crate::utils::sanitize_filename(video_id));
        let pcm_file = tokio::task::spawn_blocking(move || write_pcm(&audio_dir, &prefix, &pcm))
            .await
            .context("PCM writer task failed")??;
        self.encoder.encode(pcm_file.path(), &output).await?;
        pcm_file.close().context("Failed to remove temporary PCM file")?;

        tracing::info!("Audio successfully saved to {}", output.display());
        Ok(output)
    }

    async fn cached_audio(&self, video_id: &str) -> Option<PathBuf> {
        let path = self.audio_path(video_id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::MockSpeechBackend;
    use tempfile::TempDir;
    use transcode::MockAudioEncoder;

    #[test]
    fn test_count_cjk_chars() {
        assert_eq!(count_cjk_chars("你好，世界！This is a test."), 6);
        assert_eq!(count_cjk_chars("这是测试？！"), 6);
        assert_eq!(count_cjk_chars("This is a test."), 0);
    }

    #[test]
    fn test_split_chinese_text() {
        let text = "你好".repeat(200);
        let chunks = split_text(&text);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(count_cjk_chars(chunk) <= 150);
            assert!(chunk.chars().map(char_weight).sum::<usize>() < MAX_CHUNK_WEIGHT);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_is_lossless_for_mixed_text() {
        let text = format!("  {}\n\n{}  ", "Hello, world. ".repeat(60), "混合文本。".repeat(50));
        let chunks = split_text(&text);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_text("这是一个简短的测试"), vec!["这是一个简短的测试"]);
        assert!(split_text("").is_empty());
    }

    fn copying_encoder() -> MockAudioEncoder {
        let mut encoder = MockAudioEncoder::new();
        encoder.expect_encode().times(1).returning(|pcm, output| {
            fs_err::copy(pcm, output).unwrap();
            Ok(())
        });
        encoder
    }

    #[tokio::test]
    async fn test_synthesize_concatenates_pcm_in_order() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .times(2)
            .returning(|text, _| Ok(BASE64_STANDARD.encode(&text.as_bytes()[..1])));

        let pipeline = TtsPipeline::new(Arc::new(backend), Arc::new(copying_encoder()), dir.path());
        let text = format!("a{}b", "x".repeat(MAX_CHUNK_WEIGHT - 1));
        let path = pipeline.synthesize("video1", &text).await.unwrap();

        assert_eq!(path, dir.path().join("video1.mp3"));
        assert_eq!(fs_err::read(&path).unwrap(), b"ax");
        // temporary PCM is removed
        let leftovers: Vec<_> = fs_err::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "pcm").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_large_pcm_is_written_whole() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .returning(|_, _| Ok(BASE64_STANDARD.encode(vec![7u8; 1 << 20])));

        let pipeline = TtsPipeline::new(Arc::new(backend), Arc::new(copying_encoder()), dir.path().join("audio"));
        let text = "x".repeat(MAX_CHUNK_WEIGHT * 3);
        let path = pipeline.synthesize("video1", &text).await.unwrap();

        let chunks = split_text(&text).len();
        assert_eq!(fs_err::metadata(&path).unwrap().len(), (chunks << 20) as u64);
    }

    #[tokio::test]
    async fn test_existing_audio_short_circuits() {
        let dir = TempDir::new().unwrap();
        fs_err::write(dir.path().join("video1.mp3"), b"cached").unwrap();

        let mut backend = MockSpeechBackend::new();
        backend.expect_synthesize().times(0);
        let mut encoder = MockAudioEncoder::new();
        encoder.expect_encode().times(0);

        let pipeline = TtsPipeline::new(Arc::new(backend), Arc::new(encoder), dir.path());
        let path = pipeline.synthesize("video1", "text").await.unwrap();
        assert_eq!(path, dir.path().join("video1.mp3"));
    }

    #[tokio::test]
    async fn test_backend_error_is_returned_unwrapped() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("voice service down")));
        let mut encoder = MockAudioEncoder::new();
        encoder.expect_encode().times(0);

        let pipeline = TtsPipeline::new(Arc::new(backend), Arc::new(encoder), dir.path());
        let err = pipeline.synthesize("video1", "hello").await.unwrap_err();
        assert_eq!(err.to_string(), "voice service down");
        assert!(pipeline.cached_audio("video1").await.is_none());
    }

    #[tokio::test]
    async fn test_encoder_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .returning(|_, _| Ok("AAAA".to_string()));
        let mut encoder = MockAudioEncoder::new();
        encoder.expect_encode().times(1).returning(|_, _| {
            Err(TranscodeError::Failed {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found".to_string(),
            })
        });

        let pipeline = TtsPipeline::new(Arc::new(backend), Arc::new(encoder), dir.path());
        let err = pipeline.synthesize("video1", "hello").await.unwrap_err();
        assert!(err.to_string().contains("Invalid data found"));
    }
}
