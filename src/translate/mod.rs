use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TranslatorConfig;

pub mod openai;

pub use openai::{ChatBackend, OpenAiChatBackend};

/// Token ceiling of a single translation request
pub const MAX_CHUNK_TOKENS: usize = 5000;

/// Separator between translated chunks, keeps re-chunking visible to readers
pub const CHUNK_SEPARATOR: &str = "\n\n";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    #[error("Translation error: {0} is required")]
    MissingConfig(&'static str),

    #[error("Translation error: {0}")]
    Backend(String),
}

/// Translates plain text into a target language
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslationError>;
}

/// Estimate in tenths of a token: 3 per ASCII character, 6 otherwise
fn estimate_tenths(text: &str) -> usize {
    text.chars().map(|c| if c.is_ascii() { 3 } else { 6 }).sum()
}

/// Rough token estimate: 0.3 per ASCII character, 0.6 otherwise, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    (estimate_tenths(text) + 9) / 10
}

/// Split text on whitespace into chunks of at most `max_tokens` estimated tokens.
///
/// The estimate covers the joined chunk, separating spaces included. Words are
/// never split; a single word larger than the ceiling forms its own chunk.
pub fn split_chunks(text: &str, max_tokens: usize) -> Vec<String> {
    const SPACE_TENTHS: usize = 3;
    let max_tenths = max_tokens * 10;

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tenths = 0usize;

    for word in text.split_whitespace() {
        let word_tenths = estimate_tenths(word);
        if !current.is_empty() && current_tenths + SPACE_TENTHS + word_tenths > max_tenths {
            chunks.push(std::mem::take(&mut current));
            current_tenths = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_tenths += SPACE_TENTHS;
        }
        current.push_str(word);
        current_tenths += word_tenths;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn system_prompt(target_language: &str) -> String {
    format!(
        ";; Treat next line as plain text input and translate it into {}, output translation ONLY. \
         If translation is unnecessary (e.g. proper nouns, codes, etc.), return the original text. \
         NO explanations. NO notes. The paragraph division may be incorrect, restructure it into a more reasonable division.",
        target_language
    )
}

/// Chunked translation over a chat completion backend
pub struct TranslationEngine {
    backend: Arc<dyn ChatBackend>,
    model: String,
    max_chunk_tokens: usize,
}

impl TranslationEngine {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            max_chunk_tokens: MAX_CHUNK_TOKENS,
        }
    }

    /// Validate the configuration and build an OpenAI-compatible engine.
    ///
    /// Fails before any network activity when a required field is missing.
    pub fn from_config(config: &TranslatorConfig, timeout: Duration) -> Result<Self, TranslationError> {
        let api_key = required(&config.api_key, "OpenAI API key")?;
        let base_url = required(&config.base_url, "OpenAI base URL")?;
        let model = required(&config.model, "OpenAI model")?;

        let backend = OpenAiChatBackend::new(base_url, api_key, timeout)
            .map_err(|e| TranslationError::Backend(e.to_string()))?;

        Ok(Self::new(Arc::new(backend), model))
    }

    pub fn with_max_chunk_tokens(mut self, max_chunk_tokens: usize) -> Self {
        self.max_chunk_tokens = max_chunk_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, TranslationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(TranslationError::MissingConfig(name))
}

#[async_trait]
impl Translate for TranslationEngine {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslationError> {
        let chunks = split_chunks(text, self.max_chunk_tokens);
        let prompt = system_prompt(target_language);
        let mut translated = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            tracing::info!("Translating chunk {}/{}", index + 1, chunks.len());

            let content = self
                .backend
                .complete(&prompt, chunk, &self.model)
                .await
                .map_err(|e| {
                    tracing::error!("Translation backend error: {:#}", e);
                    TranslationError::Backend(e.to_string())
                })?;

            translated.push(content.map(|c| c.trim().to_string()).unwrap_or_default());
        }

        let result = translated.join(CHUNK_SEPARATOR);
        tracing::info!(
            "Translation completed: original_length={}, translated_length={}",
            text.chars().count(),
            result.chars().count()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use openai::MockChatBackend;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
        assert_eq!(estimate_tokens("abcdefghij"), 3);
        assert_eq!(estimate_tokens("你好"), 2);
        assert_eq!(estimate_tokens("你好你好你"), 3);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_chunks("  hello\n world  ", MAX_CHUNK_TOKENS), vec!["hello world"]);
        assert!(split_chunks(" \n\t ", MAX_CHUNK_TOKENS).is_empty());
    }

    #[test]
    fn test_chunks_respect_ceiling_and_order() {
        let text: String = (0..600).map(|i| format!("w{} ", i)).collect::<String>() + "\n\nend";
        let chunks = split_chunks(&text, 50);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(estimate_tokens(chunk) <= 50);
        }
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(chunks.join(" "), normalized);
    }

    #[test]
    fn test_oversized_word_stands_alone() {
        let huge = "x".repeat(100);
        let text = format!("a {} b", huge);
        let chunks = split_chunks(&text, 10);
        assert_eq!(chunks, vec!["a".to_string(), huge, "b".to_string()]);
    }

    #[test]
    fn test_joining_spaces_count_toward_ceiling() {
        let text = vec!["abc"; 12000].join(" ");
        let chunks = split_chunks(&text, MAX_CHUNK_TOKENS);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(estimate_tokens(chunk) <= MAX_CHUNK_TOKENS);
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[tokio::test]
    async fn test_translates_chunks_in_order() {
        let mut backend = MockChatBackend::new();
        let mut seq = Sequence::new();
        for (input, output) in [("one two", " uno dos \n"), ("three", "tres")] {
            backend
                .expect_complete()
                .withf(move |prompt, text, model| {
                    prompt.contains("translate it into es") && text == input && model == "gpt-test"
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_, _, _| Ok(Some(output.to_string())));
        }

        let engine = TranslationEngine::new(Arc::new(backend), "gpt-test").with_max_chunk_tokens(3);
        let translated = engine.translate("one two\nthree", "es").await.unwrap();
        assert_eq!(translated, "uno dos\n\ntres");
    }

    #[tokio::test]
    async fn test_empty_backend_content_becomes_empty_string() {
        let mut backend = MockChatBackend::new();
        backend.expect_complete().times(1).returning(|_, _, _| Ok(None));

        let engine = TranslationEngine::new(Arc::new(backend), "gpt-test");
        assert_eq!(engine.translate("hello", "zh").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_backend_error_aborts_translation() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("rate limited")));

        let engine = TranslationEngine::new(Arc::new(backend), "gpt-test").with_max_chunk_tokens(1);
        let err = engine.translate("first second third", "zh").await.unwrap_err();
        assert_eq!(err, TranslationError::Backend("rate limited".to_string()));
        assert_eq!(err.to_string(), "Translation error: rate limited");
    }

    #[test]
    fn test_config_validation_names_missing_field() {
        let timeout = Duration::from_secs(5);
        let config = |api_key: Option<&str>, base_url: Option<&str>, model: Option<&str>| TranslatorConfig {
            api_key: api_key.map(str::to_string),
            base_url: base_url.map(str::to_string),
            model: model.map(str::to_string),
        };

        let err = TranslationEngine::from_config(&config(None, Some("http://x"), Some("m")), timeout).err();
        assert_eq!(err.unwrap().to_string(), "Translation error: OpenAI API key is required");

        let err = TranslationEngine::from_config(&config(Some("k"), Some(" "), Some("m")), timeout).err();
        assert_eq!(err.unwrap().to_string(), "Translation error: OpenAI base URL is required");

        let err = TranslationEngine::from_config(&config(Some("k"), Some("http://x"), None), timeout).err();
        assert_eq!(err.unwrap().to_string(), "Translation error: OpenAI model is required");

        let engine = TranslationEngine::from_config(&config(Some("k"), Some("http://x"), Some("m")), timeout);
        assert_eq!(engine.unwrap().model(), "m");
    }
}
