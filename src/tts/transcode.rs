use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Turns a raw PCM file into the playback container at `output`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    async fn encode(&self, pcm_path: &Path, output: &Path) -> Result<(), TranscodeError>;
}

/// ffmpeg encoding s16le mono PCM to MP3
pub struct FfmpegEncoder {
    program: String,
    sample_rate: u32,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            program: program.into(),
            sample_rate,
        }
    }

    fn args(&self, pcm_path: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "s16le".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-i".to_string(),
            pcm_path.to_string_lossy().into_owned(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn encode(&self, pcm_path: &Path, output: &Path) -> Result<(), TranscodeError> {
        tracing::debug!("Encoding {} -> {}", pcm_path.display(), output.display());

        let result = Command::new(&self.program)
            .args(self.args(pcm_path, output))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(TranscodeError::Failed {
                program: self.program.clone(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
