use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::pipeline::SubtitleResult;

/// Render a result in the requested format
pub fn render(result: &SubtitleResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(result)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

/// Title line, provenance line, blank line, then the paragraphs
pub fn format_as_text(result: &SubtitleResult) -> String {
    let version = &result.version;
    let provenance = if version.is_translation() {
        format!("{} (translated from {})", version.language, version.original_language)
    } else {
        version.language.clone()
    };

    let mut out = format!("{}\n[{}] {}\n", result.title, result.video_id, provenance);
    if let Some(audio) = &result.audio_path {
        out.push_str(&format!("Audio: {}\n", audio.display()));
    }
    out.push('\n');
    out.push_str(&version.subtitle);
    out
}

/// Save a result to file
pub async fn save_to_file(result: &SubtitleResult, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a result to stdout
pub fn print_to_console(result: &SubtitleResult, format: &OutputFormat) -> Result<()> {
    println!("{}", render(result, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SubtitleVersion;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn result(language: &str, audio_path: Option<PathBuf>) -> SubtitleResult {
        SubtitleResult {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "Test Video".to_string(),
            version: SubtitleVersion {
                subtitle: "First paragraph.\nSecond paragraph".to_string(),
                language: language.to_string(),
                original_language: "en".to_string(),
            },
            audio_path,
        }
    }

    #[test]
    fn test_text_format() {
        let text = format_as_text(&result("en", None));
        assert_eq!(
            text,
            "Test Video\n[dQw4w9WgXcQ] en\n\nFirst paragraph.\nSecond paragraph"
        );

        let text = format_as_text(&result("zh", Some(PathBuf::from("/audio/dQw4w9WgXcQ.mp3"))));
        assert!(text.contains("zh (translated from en)"));
        assert!(text.contains("Audio: /audio/dQw4w9WgXcQ.mp3"));
    }

    #[test]
    fn test_json_format() {
        let json = render(&result("zh", None), &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Test Video");
        assert_eq!(value["language"], "zh");
        assert_eq!(value["subtitle"], "First paragraph.\nSecond paragraph");
    }

    #[tokio::test]
    async fn test_save_to_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("video.json");
        save_to_file(&result("en", None), &path, &OutputFormat::Json).await.unwrap();
        assert!(fs_err::read_to_string(&path).unwrap().contains("\"videoId\""));
    }
}
