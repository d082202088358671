use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::transcript::extract_video_id;

pub mod progress;

pub use progress::ProgressReporter;

/// Language used when a task does not name one
pub const DEFAULT_TASK_LANGUAGE: &str = "zh";

/// Lifecycle of a subtitle task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Downloading,
    Translating,
    GeneratingAudio,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Downloading => 1,
            TaskStatus::Translating => 2,
            TaskStatus::GeneratingAudio => 3,
            TaskStatus::Completed | TaskStatus::Failed => 4,
        }
    }

    /// Forward-only moves; `Failed` is reachable from any non-terminal state
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == TaskStatus::Failed || next.rank() >= self.rank()
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Downloading => "Downloading subtitles",
            TaskStatus::Translating => "Translating",
            TaskStatus::GeneratingAudio => "Generating audio",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Downloading => write!(f, "DOWNLOADING"),
            TaskStatus::Translating => write!(f, "TRANSLATING"),
            TaskStatus::GeneratingAudio => write!(f, "GENERATING_AUDIO"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One end-to-end subtitle request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub video_id: String,
    pub url: String,
    pub language: String,
    pub need_tts: bool,
    pub status: TaskStatus,
    /// 0 to 100
    pub progress: u8,
    pub title: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transition points the pipeline drives on a task record
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskReporter: Send + Sync {
    async fn update_status(&self, task_id: &str, status: TaskStatus, progress: u8) -> anyhow::Result<()>;

    /// Mark completed with progress 100
    async fn complete(&self, task_id: &str, title: &str) -> anyhow::Result<()>;

    /// Mark failed, storing the error message
    async fn fail(&self, task_id: &str, error: &str) -> anyhow::Result<()>;
}

/// In-process task table
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `PENDING` task for a video URL
    pub async fn create_task(&self, url: &str, language: Option<&str>, need_tts: bool) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            video_id: extract_video_id(url).unwrap_or_else(|_| url.to_string()),
            url: url.to_string(),
            language: language.unwrap_or(DEFAULT_TASK_LANGUAGE).to_string(),
            need_tts,
            status: TaskStatus::Pending,
            progress: 0,
            title: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.tasks.write().await.insert(task.id.clone(), task.clone());
        task
    }

    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// Most recent tasks first
    pub async fn list(&self, limit: usize) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        tasks
    }

    async fn transition(&self, task_id: &str, status: TaskStatus, apply: impl FnOnce(&mut Task)) -> anyhow::Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow::anyhow!("Task not found: {}", task_id))?;

        if !task.status.can_transition_to(status) {
            anyhow::bail!("Task {} cannot move from {} to {}", task_id, task.status, status);
        }

        task.status = status;
        apply(task);
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TaskReporter for MemoryTaskStore {
    async fn update_status(&self, task_id: &str, status: TaskStatus, progress: u8) -> anyhow::Result<()> {
        self.transition(task_id, status, |task| task.progress = progress.min(100))
            .await
    }

    async fn complete(&self, task_id: &str, title: &str) -> anyhow::Result<()> {
        self.transition(task_id, TaskStatus::Completed, |task| {
            task.progress = 100;
            task.title = Some(title.to_string());
        })
        .await
    }

    async fn fail(&self, task_id: &str, error: &str) -> anyhow::Result<()> {
        self.transition(task_id, TaskStatus::Failed, |task| {
            task.error = Some(error.to_string());
        })
        .await
    }
}
