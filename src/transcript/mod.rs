use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub mod cookies;
pub mod paragraphs;
pub mod youtube;

pub use cookies::parse_cookie_jar;
pub use paragraphs::{join_paragraphs, reconstruct, MAX_PARAGRAPH_WORDS};
pub use youtube::{PageClient, PageResponse, ReqwestPageClient, RequestHeaders, YoutubeTranscriptFetcher};

/// One language's caption stream as advertised by the video page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub language_code: String,
    pub base_url: String,
}

/// One timed `<text>` element of a caption document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    /// Caption text, entities decoded and newlines flattened
    pub text: String,

    /// Start offset in seconds
    pub offset_seconds: f64,

    /// Display duration in seconds
    pub duration_seconds: f64,
}

/// Result of fetching one caption track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Page title with the platform suffix removed
    pub title: String,

    /// Fragments in order of appearance
    pub fragments: Vec<TranscriptFragment>,

    /// Language code of the caption track that was downloaded
    pub language: String,
}

/// Options for a single fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Caption language to download; the first track is used when absent
    pub language: Option<String>,

    /// Pre-built `Cookie` header value
    pub cookie_header: Option<String>,
}

impl FetchOptions {
    pub fn new(language: Option<&str>, cookie_header: Option<&str>) -> Self {
        Self {
            language: language.map(str::to_string),
            cookie_header: cookie_header.filter(|c| !c.is_empty()).map(str::to_string),
        }
    }
}

/// Failures while locating or downloading a caption track
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TranscriptError {
    #[error("YouTube is receiving too many requests from this IP and now requires solving a captcha to continue")]
    TooManyRequests,

    #[error("The video is no longer available ({video_id})")]
    VideoUnavailable { video_id: String },

    #[error("Transcript is disabled on this video ({video_id})")]
    Disabled { video_id: String },

    #[error("No transcripts are available for this video ({video_id})")]
    NotAvailable { video_id: String },

    #[error(
        "No transcripts are available in {language} this video ({video_id}). Available languages: {}",
        .available.join(", ")
    )]
    NotAvailableLanguage {
        language: String,
        available: Vec<String>,
        video_id: String,
    },

    #[error("Impossible to retrieve Youtube video ID from: {input}")]
    InvalidIdentifier { input: String },

    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

impl TranscriptError {
    /// Video identifier the error refers to, if any
    pub fn video_id(&self) -> Option<&str> {
        match self {
            TranscriptError::VideoUnavailable { video_id }
            | TranscriptError::Disabled { video_id }
            | TranscriptError::NotAvailable { video_id }
            | TranscriptError::NotAvailableLanguage { video_id, .. } => Some(video_id),
            _ => None,
        }
    }
}

/// Source of transcripts, implemented by the YouTube fetcher
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the transcript for a video URL or identifier
    async fn fetch(&self, identifier: &str, options: &FetchOptions) -> Result<Transcript, TranscriptError>;
}

const VIDEO_ID_LENGTH: usize = 11;

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
        )
        .expect("video id pattern is valid")
    })
}

/// Exactly 11 characters from the URL-safe base64 alphabet
fn is_bare_video_id(input: &str) -> bool {
    input.len() == VIDEO_ID_LENGTH
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Normalize a video URL or bare identifier into the 11 character video ID
pub fn extract_video_id(input: &str) -> Result<String, TranscriptError> {
    let input = input.trim();
    if is_bare_video_id(input) {
        return Ok(input.to_string());
    }

    video_id_pattern()
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| TranscriptError::InvalidIdentifier {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ?start=3").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_extract_video_id_rejects_garbage() {
        let err = extract_video_id("definitely not a video").unwrap_err();
        assert!(matches!(err, TranscriptError::InvalidIdentifier { .. }));
        assert!(extract_video_id("https://example.com/watch?x=1").is_err());
    }

    #[test]
    fn test_eleven_characters_outside_id_alphabet_are_rejected() {
        for input in ["hello world", "https://x.y", "abc/def?ghi", "ünïcödé123"] {
            assert!(
                matches!(extract_video_id(input), Err(TranscriptError::InvalidIdentifier { .. })),
                "{input} should be rejected"
            );
        }
        assert_eq!(extract_video_id(" a-b_C1d2E3f ").unwrap(), "a-b_C1d2E3f");
    }

    #[test]
    fn test_language_error_message() {
        let err = TranscriptError::NotAvailableLanguage {
            language: "fr".to_string(),
            available: vec!["en".to_string(), "es".to_string()],
            video_id: "validVideo1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No transcripts are available in fr this video (validVideo1). Available languages: en, es"
        );
        assert_eq!(err.video_id(), Some("validVideo1"));
        assert_eq!(TranscriptError::TooManyRequests.video_id(), None);
    }

    #[test]
    fn test_fetch_options_drop_empty_cookie() {
        let options = FetchOptions::new(Some("en"), Some(""));
        assert_eq!(options.language.as_deref(), Some("en"));
        assert!(options.cookie_header.is_none());
    }
}
