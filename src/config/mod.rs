use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Translation backend
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Speech synthesis backend
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

/// OpenAI-compatible chat completion settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Synthesis endpoint URL
    pub endpoint: Option<String>,

    /// Bearer token sent to the endpoint
    pub api_key: Option<String>,

    /// Voice identifier understood by the backend
    pub voice_type: u32,

    /// PCM sample rate in Hz
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Subtitle cache directory (defaults to the user cache dir)
    pub cache_dir: Option<PathBuf>,

    /// Generated audio directory (defaults to the user cache dir)
    pub audio_dir: Option<PathBuf>,

    /// Netscape-format cookie jar sent with YouTube requests
    pub cookie_file: Option<PathBuf>,

    /// Target language when none is given
    pub default_language: String,

    /// Timeout applied to every HTTP request
    pub request_timeout_secs: u64,

    /// Encoder used to turn PCM into MP3
    pub ffmpeg_path: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            voice_type: 101001,
            sample_rate: 16000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            audio_dir: None,
            cookie_file: None,
            default_language: "zh".to_string(),
            request_timeout_secs: 30,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

const APP_DIR: &str = "subtitle-translator";

impl Config {
    /// Load configuration from file or create default, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content)
                .context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join(APP_DIR).join("config.yaml"))
    }

    /// Override settings from environment variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("OPENAI_API_KEY") {
            self.translator.api_key = Some(v);
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            self.translator.base_url = Some(v);
        }
        if let Some(v) = var("OPENAI_MODEL") {
            self.translator.model = Some(v);
        }
        if let Some(v) = var("TTS_ENDPOINT") {
            self.speech.endpoint = Some(v);
        }
        if let Some(v) = var("TTS_API_KEY") {
            self.speech.api_key = Some(v);
        }
        if let Some(v) = var("COOKIE_FILE") {
            self.app.cookie_file = Some(PathBuf::from(v));
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.app.default_language.trim().is_empty() {
            anyhow::bail!("app.default_language must not be empty");
        }
        if self.app.request_timeout_secs == 0 {
            anyhow::bail!("app.request_timeout_secs must be greater than zero");
        }
        if self.speech.sample_rate == 0 {
            anyhow::bail!("speech.sample_rate must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.app.request_timeout_secs)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.app
            .cache_dir
            .clone()
            .unwrap_or_else(|| Self::data_root().join("subtitles"))
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.app
            .audio_dir
            .clone()
            .unwrap_or_else(|| Self::data_root().join("audio"))
    }

    fn data_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Translator Base URL: {}", self.translator.base_url.as_deref().unwrap_or("<unset>"));
        println!("  Translator Model: {}", self.translator.model.as_deref().unwrap_or("<unset>"));
        println!("  Translator API Key: {}", mask(self.translator.api_key.as_deref()));
        println!("  Speech Endpoint: {}", self.speech.endpoint.as_deref().unwrap_or("<unset>"));
        println!("  Speech API Key: {}", mask(self.speech.api_key.as_deref()));
        println!("  Voice Type: {}", self.speech.voice_type);
        println!("  Cache Dir: {}", self.cache_dir().display());
        println!("  Audio Dir: {}", self.audio_dir().display());
        if let Some(cookie_file) = &self.app.cookie_file {
            println!("  Cookie File: {}", cookie_file.display());
        }
        println!("  Default Language: {}", self.app.default_language);
        println!("  Request Timeout: {}s", self.app.request_timeout_secs);
    }
}

/// Hide all but the last four characters of a secret
pub fn mask(secret: Option<&str>) -> String {
    match secret {
        None | Some("") => "<unset>".to_string(),
        Some(s) => {
            let chars: Vec<char> = s.chars().collect();
            if chars.len() <= 4 {
                "****".to_string()
            } else {
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("****{}", tail)
            }
        }
    }
}
