use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One language's processed subtitle for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleVersion {
    /// Paragraphs joined by newlines
    pub subtitle: String,

    /// Language of this version
    pub language: String,

    /// Language that was actually downloaded before any translation
    pub original_language: String,
}

impl SubtitleVersion {
    /// Whether this version was produced by translating another language
    pub fn is_translation(&self) -> bool {
        self.language != self.original_language
    }
}

/// Every known version of one video, stored as a single document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Last modification, epoch milliseconds
    pub timestamp: i64,
    pub title: String,
    pub versions: BTreeMap<String, SubtitleVersion>,
}

impl CacheEntry {
    pub fn new(title: &str) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            title: title.to_string(),
            versions: BTreeMap::new(),
        }
    }

    /// Insert or replace the version keyed by its own language
    pub fn upsert(&mut self, version: SubtitleVersion) {
        self.timestamp = chrono::Utc::now().timestamp_millis();
        self.versions.insert(version.language.clone(), version);
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Failed to write subtitle cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize subtitle cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Storage of subtitle versions keyed by video identifier.
///
/// Writers race last-wins on the same video; callers serialize per task.
#[async_trait]
pub trait SubtitleStore: Send + Sync {
    /// Whole entry for a video; any read or parse failure is a miss
    async fn entry(&self, video_id: &str) -> Option<CacheEntry>;

    /// Store `version` under its language, keeping sibling languages
    async fn write(&self, video_id: &str, title: &str, version: SubtitleVersion) -> Result<CacheEntry, CacheError>;

    /// Single version for a video and language
    async fn read(&self, video_id: &str, language: &str) -> Option<(String, SubtitleVersion)> {
        let entry = self.entry(video_id).await?;
        let version = entry.versions.get(language)?.clone();
        Some((entry.title, version))
    }
}

/// One JSON document per video under a cache directory
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, video_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", crate::utils::sanitize_filename(video_id)))
    }
}

/// Write through a sibling temp file so readers never see a partial document
fn persist(dir: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    fs_err::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl SubtitleStore for JsonFileCache {
    async fn entry(&self, video_id: &str) -> Option<CacheEntry> {
        let path = self.entry_path(video_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Cache miss for {}: {}", video_id, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn write(&self, video_id: &str, title: &str, version: SubtitleVersion) -> Result<CacheEntry, CacheError> {
        let path = self.entry_path(video_id);
        let mut entry = self.entry(video_id).await.unwrap_or_else(|| CacheEntry::new(title));
        let language = version.language.clone();
        entry.upsert(version);

        let content = serde_json::to_vec_pretty(&entry)?;
        let dir = self.dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || persist(&dir, &target, &content))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
            .map_err(|source| CacheError::Write { path: path.clone(), source })?;

        tracing::info!("Cached {} subtitles for {} at {}", language, video_id, path.display());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn version(language: &str, original: &str, text: &str) -> SubtitleVersion {
        SubtitleVersion {
            subtitle: text.to_string(),
            language: language.to_string(),
            original_language: original.to_string(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_keeps_sibling_languages() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());

        cache.write("video1", "Title", version("en", "en", "hello")).await.unwrap();
        let entry = cache.write("video1", "Title", version("zh", "en", "你好")).await.unwrap();
        assert_eq!(entry.versions.len(), 2);

        let (title, en) = cache.read("video1", "en").await.unwrap();
        assert_eq!(title, "Title");
        assert_eq!(en, version("en", "en", "hello"));
        assert!(!en.is_translation());

        let (_, zh) = cache.read("video1", "zh").await.unwrap();
        assert!(zh.is_translation());
        assert!(cache.read("video1", "fr").await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_timestamp() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested"));

        let first = cache.write("video1", "Title", version("en", "en", "old")).await.unwrap();
        let second = cache.write("video1", "Other", version("en", "en", "new")).await.unwrap();

        assert!(second.timestamp >= first.timestamp);
        // title is fixed when the entry is created
        assert_eq!(second.title, "Title");
        assert_eq!(cache.read("video1", "en").await.unwrap().1.subtitle, "new");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss_and_gets_replaced() {
        let dir = TempDir::new().unwrap();
        fs_err::write(dir.path().join("video1.json"), "{ not json").unwrap();
        let cache = JsonFileCache::new(dir.path());

        assert!(cache.entry("video1").await.is_none());
        cache.write("video1", "Fresh", version("en", "en", "text")).await.unwrap();
        assert_eq!(cache.entry("video1").await.unwrap().title, "Fresh");
    }

    #[tokio::test]
    async fn test_document_layout() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());
        cache.write("video1", "Title", version("zh", "en", "text")).await.unwrap();

        let raw = fs_err::read_to_string(dir.path().join("video1.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["title"], "Title");
        assert_eq!(value["versions"]["zh"]["originalLanguage"], "en");
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_write_leaves_only_the_entry_file() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested").join("subtitles"));

        for language in ["en", "zh", "es"] {
            cache
                .write("video1", "Title", version(language, "en", "text"))
                .await
                .unwrap();
        }

        let names: Vec<String> = fs_err::read_dir(cache.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["video1.json".to_string()]);
        assert_eq!(cache.entry("video1").await.unwrap().versions.len(), 3);
    }
}
