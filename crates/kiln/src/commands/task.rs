//! Single transform task command.

use anyhow::{Context, Result};
use kiln_pipeline::{ProjectLayout, TaskKind, TaskReport};

use crate::config::ConfigFile;

/// Run one task against the configured app directory.
pub async fn run(file_config: &ConfigFile, kind: TaskKind) -> Result<()> {
    let report = run_blocking(file_config.layout(), kind).await?;
    log_report(&report);
    Ok(())
}

/// Run `kind` on the blocking pool.
pub async fn run_blocking(layout: ProjectLayout, kind: TaskKind) -> Result<TaskReport> {
    let report = tokio::task::spawn_blocking(move || kind.task().run(&layout))
        .await
        .with_context(|| format!("{} task aborted", kind))?
        .with_context(|| format!("{} task failed", kind))?;
    Ok(report)
}

pub fn log_report(report: &TaskReport) {
    tracing::info!(
        "{}: {} written, {} up to date, {} failed ({}ms)",
        report.task,
        report.written.len(),
        report.skipped,
        report.failures.len(),
        report.duration_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn runs_task_on_blocking_pool() {
        let temp = tempdir().unwrap();
        let layout = ProjectLayout::new(temp.path().join("app"), temp.path().join("dist"));
        fs::create_dir_all(layout.pages_dir()).unwrap();
        fs::write(layout.pages_dir().join("index.html"), "<p>{{ page }}</p>").unwrap();

        let report = run_blocking(layout.clone(), TaskKind::Pages).await.unwrap();

        assert_eq!(report.written, vec![layout.app_path("index.html")]);
    }
}
