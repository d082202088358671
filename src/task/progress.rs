use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use super::{TaskReporter, TaskStatus};

/// Mirrors task transitions onto a console progress bar
pub struct ProgressReporter {
    inner: Arc<dyn TaskReporter>,
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(inner: Arc<dyn TaskReporter>, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                    .unwrap()
                    .progress_chars("=> "),
            );
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar
        };
        bar.set_message(TaskStatus::Pending.label());

        Self { inner, bar }
    }
}

#[async_trait]
impl TaskReporter for ProgressReporter {
    async fn update_status(&self, task_id: &str, status: TaskStatus, progress: u8) -> anyhow::Result<()> {
        self.bar.set_position(progress as u64);
        self.bar.set_message(status.label());
        self.inner.update_status(task_id, status, progress).await
    }

    async fn complete(&self, task_id: &str, title: &str) -> anyhow::Result<()> {
        self.bar.set_position(100);
        self.bar.finish_with_message(format!("Completed: {}", title));
        self.inner.complete(task_id, title).await
    }

    async fn fail(&self, task_id: &str, error: &str) -> anyhow::Result<()> {
        self.bar.abandon_with_message(format!("Failed: {}", error));
        self.inner.fail(task_id, error).await
    }
}
