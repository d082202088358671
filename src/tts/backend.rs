use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::SpeechConfig;

/// Speech synthesis backend returning base64 encoded raw PCM
/// (16 kHz, mono, signed 16-bit little endian)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, session_id: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SpeechRequest<'a> {
    text: &'a str,
    session_id: &'a str,
    voice_type: u32,
    sample_rate: u32,
    codec: &'static str,
}

/// JSON-over-HTTP speech endpoint.
///
/// Accepts either a flat `{"Audio": ..}` body or one wrapped in `{"Response": ..}`.
pub struct HttpSpeechBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    voice_type: u32,
    sample_rate: u32,
}

impl HttpSpeechBackend {
    pub fn from_config(config: &SpeechConfig, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .context("Speech endpoint is not configured")?;

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            voice_type: config.voice_type,
            sample_rate: config.sample_rate,
        })
    }
}

#[async_trait]
impl SpeechBackend for HttpSpeechBackend {
    async fn synthesize(&self, text: &str, session_id: &str) -> anyhow::Result<String> {
        let request = SpeechRequest {
            text,
            session_id,
            voice_type: self.voice_type,
            sample_rate: self.sample_rate,
            codec: "pcm",
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.context("Speech request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Speech backend returned {}: {}", status, body);
        }

        let body: Value = response.json().await.context("Invalid speech response")?;
        extract_audio(&body)
    }
}

fn extract_audio(body: &Value) -> anyhow::Result<String> {
    let payload = body.get("Response").unwrap_or(body);
    if let Some(error) = payload.get("Error") {
        let message = error["Message"].as_str().unwrap_or("unknown error");
        anyhow::bail!("Speech backend error: {}", message);
    }

    payload["Audio"]
        .as_str()
        .map(str::to_string)
        .context("Speech response has no audio")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_audio_shapes() {
        assert_eq!(extract_audio(&json!({ "Audio": "AAAA" })).unwrap(), "AAAA");
        assert_eq!(
            extract_audio(&json!({ "Response": { "Audio": "BBBB", "SessionId": "s" } })).unwrap(),
            "BBBB"
        );
    }

    #[test]
    fn test_extract_audio_errors() {
        let err = extract_audio(&json!({ "Response": { "Error": { "Message": "quota exceeded" } } })).unwrap_err();
        assert_eq!(err.to_string(), "Speech backend error: quota exceeded");
        assert!(extract_audio(&json!({})).is_err());
    }

    #[test]
    fn test_request_field_names() {
        let request = SpeechRequest {
            text: "hi",
            session_id: "abc",
            voice_type: 101001,
            sample_rate: 16000,
            codec: "pcm",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["SessionId"], "abc");
        assert_eq!(value["VoiceType"], 101001);
        assert_eq!(value["Codec"], "pcm");
    }

    #[test]
    fn test_requires_endpoint() {
        let config = SpeechConfig::default();
        assert!(HttpSpeechBackend::from_config(&config, Duration::from_secs(5)).is_err());
    }
}
