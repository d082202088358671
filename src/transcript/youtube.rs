use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::{extract_video_id, CaptionTrack, FetchOptions, Transcript, TranscriptError, TranscriptFragment, TranscriptSource};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.83 Safari/537.36,gzip(gfe)";
const TITLE_SUFFIX: &str = " - YouTube";
const UNTITLED: &str = "Untitled";

const CAPTIONS_MARKER: &str = "\"captions\":";
const VIDEO_DETAILS_MARKER: &str = ",\"videoDetails";
const CAPTCHA_MARKER: &str = "class=\"g-recaptcha\"";
const PLAYABILITY_MARKER: &str = "\"playabilityStatus\":";

/// Headers sent with both the page and the caption document requests
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeaders {
    pub accept_language: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: String,
}

impl RequestHeaders {
    fn from_options(options: &FetchOptions) -> Self {
        Self {
            accept_language: options.language.clone(),
            cookie: options.cookie_header.clone(),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Status and body of a GET request
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP GET seam used by the fetcher
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<PageResponse, TranscriptError>;
}

/// [`PageClient`] backed by reqwest
pub struct ReqwestPageClient {
    client: Client,
}

impl ReqwestPageClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageClient for ReqwestPageClient {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<PageResponse, TranscriptError> {
        let transport = |e: reqwest::Error| TranscriptError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &headers.user_agent);
        if let Some(language) = &headers.accept_language {
            request = request.header(reqwest::header::ACCEPT_LANGUAGE, language);
        }
        if let Some(cookie) = &headers.cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        Ok(PageResponse { status, body })
    }
}

/// Scrapes the watch page for caption tracks and downloads one of them
pub struct YoutubeTranscriptFetcher {
    client: Arc<dyn PageClient>,
}

impl YoutubeTranscriptFetcher {
    pub fn new(client: Arc<dyn PageClient>) -> Self {
        Self { client }
    }

    /// Fetcher using a reqwest client with the given request timeout
    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(ReqwestPageClient::new(timeout)?)))
    }
}

#[async_trait]
impl TranscriptSource for YoutubeTranscriptFetcher {
    async fn fetch(&self, identifier: &str, options: &FetchOptions) -> Result<Transcript, TranscriptError> {
        let video_id = extract_video_id(identifier)?;
        tracing::debug!(
            video_id = %video_id,
            language = options.language.as_deref().unwrap_or("default"),
            has_cookies = options.cookie_header.is_some(),
            "Fetching transcript"
        );

        let headers = RequestHeaders::from_options(options);
        let page_url = format!("{}{}", WATCH_URL, urlencoding::encode(&video_id));
        let page = self.client.get(&page_url, &headers).await?;
        tracing::debug!("Video page response status: {} url: {}", page.status, page_url);

        let title = extract_title(&page.body);
        let tracks = parse_caption_tracks(&page.body, &video_id)?;
        tracing::debug!(
            count = tracks.len(),
            languages = ?tracks.iter().map(|t| t.language_code.as_str()).collect::<Vec<_>>(),
            "Found caption tracks"
        );

        let track = select_track(&tracks, options.language.as_deref(), &video_id)?;

        let document = self.client.get(&track.base_url, &headers).await.map_err(|e| {
            tracing::warn!("Caption document request failed: {}", e);
            TranscriptError::NotAvailable {
                video_id: video_id.clone(),
            }
        })?;
        tracing::debug!("Transcript response status: {} url: {}", document.status, track.base_url);

        if !document.is_success() {
            return Err(TranscriptError::NotAvailable { video_id });
        }

        let fragments = parse_fragments(&document.body);
        tracing::debug!("Parsed transcript entries: {}", fragments.len());

        Ok(Transcript {
            title,
            fragments,
            language: track.language_code.clone(),
        })
    }
}

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<title>([^<]*)</title>").expect("title pattern is valid"))
}

fn text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<text start="([^"]*)" dur="([^"]*)">([^<]*)</text>"#).expect("text pattern is valid")
    })
}

fn extract_title(body: &str) -> String {
    title_pattern()
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            let decoded = html_escape::decode_html_entities(m.as_str());
            decoded.replacen(TITLE_SUFFIX, "", 1)
        })
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Locate the embedded captions JSON and read its track list
fn parse_caption_tracks(body: &str, video_id: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let Some(captions) = body.split(CAPTIONS_MARKER).nth(1) else {
        if body.contains(CAPTCHA_MARKER) {
            return Err(TranscriptError::TooManyRequests);
        }
        if !body.contains(PLAYABILITY_MARKER) {
            return Err(TranscriptError::VideoUnavailable {
                video_id: video_id.to_string(),
            });
        }
        return Err(TranscriptError::Disabled {
            video_id: video_id.to_string(),
        });
    };

    let json = captions.split(VIDEO_DETAILS_MARKER).next().unwrap_or(captions);
    let disabled = || TranscriptError::Disabled {
        video_id: video_id.to_string(),
    };
    let not_available = || TranscriptError::NotAvailable {
        video_id: video_id.to_string(),
    };

    let value: Value = serde_json::from_str(json).map_err(|_| disabled())?;
    let renderer = value.get("playerCaptionsTracklistRenderer").ok_or_else(disabled)?;
    let tracks = renderer.get("captionTracks").ok_or_else(not_available)?;

    serde_json::from_value(tracks.clone()).map_err(|_| not_available())
}

fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    language: Option<&str>,
    video_id: &str,
) -> Result<&'a CaptionTrack, TranscriptError> {
    match language {
        Some(language) => tracks
            .iter()
            .find(|track| track.language_code == language)
            .ok_or_else(|| TranscriptError::NotAvailableLanguage {
                language: language.to_string(),
                available: tracks.iter().map(|t| t.language_code.clone()).collect(),
                video_id: video_id.to_string(),
            }),
        None => tracks.first().ok_or_else(|| TranscriptError::NotAvailable {
            video_id: video_id.to_string(),
        }),
    }
}

/// Parse every `<text>` element of a caption document in order of appearance
fn parse_fragments(document: &str) -> Vec<TranscriptFragment> {
    text_pattern()
        .captures_iter(document)
        .map(|caps| TranscriptFragment {
            offset_seconds: caps[1].parse().unwrap_or_default(),
            duration_seconds: caps[2].parse().unwrap_or_default(),
            text: decode_caption_text(&caps[3]),
        })
        .collect()
}

/// Captions arrive double-encoded, so entities are decoded twice
fn decode_caption_text(raw: &str) -> String {
    let flattened = raw.replace("\r\n", " ").replace('\n', " ");
    let once = html_escape::decode_html_entities(&flattened);
    html_escape::decode_html_entities(&once).into_owned()
}
