//! Build/publish orchestration: transform, clean, copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::clean::clean;
use crate::glob::PatternList;
use crate::layout::ProjectLayout;
use crate::task::{Task, TaskError, TaskKind, TaskReport};

/// Result of a full build.
#[derive(Debug)]
pub struct PublishResult {
    /// Reports from the transform phase, in run order
    pub transforms: Vec<TaskReport>,

    /// Whether a previous distribution directory was removed
    pub cleaned: bool,

    /// Distribution artifacts, relative to the distribution directory
    pub copied: Vec<PathBuf>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Distribution directory
    pub output_dir: PathBuf,
}

impl PublishResult {
    /// Number of transform failures across every task.
    pub fn failures(&self) -> usize {
        self.transforms.iter().map(|r| r.failures.len()).sum()
    }
}

/// Errors that abort a build, tagged with the phase that failed.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Transform phase failed in {task}: {source}")]
    Transform {
        task: TaskKind,
        #[source]
        source: TaskError,
    },

    #[error("Clean phase failed: {0}")]
    Clean(#[source] TaskError),

    #[error("Copy phase failed: {0}")]
    Copy(#[source] TaskError),
}

/// Runs every transform, then replaces the distribution directory.
pub struct Publisher {
    layout: ProjectLayout,
    tasks: Vec<Arc<dyn Task>>,
}

impl Publisher {
    /// Create a publisher running every task kind.
    pub fn new(layout: ProjectLayout) -> Self {
        let tasks = TaskKind::ALL.into_iter().map(TaskKind::task).collect();
        Self { layout, tasks }
    }

    /// Replace the transform phase's task list.
    pub fn with_tasks(mut self, tasks: Vec<Arc<dyn Task>>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Transform → Clean → Copy; each phase runs only if the previous one
    /// succeeded.
    pub fn build(&self) -> Result<PublishResult, PublishError> {
        let start = Instant::now();

        let transforms = self.transform()?;
        let cleaned = clean(&self.layout.dist_dir).map_err(PublishError::Clean)?;
        let copied = self.copy()?;

        Ok(PublishResult {
            transforms,
            cleaned,
            copied,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.layout.dist_dir.clone(),
        })
    }

    /// Run every transform task once, in order.
    pub fn transform(&self) -> Result<Vec<TaskReport>, PublishError> {
        let mut reports = Vec::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let report = task
                .run(&self.layout)
                .map_err(|source| PublishError::Transform {
                    task: task.kind(),
                    source,
                })?;

            tracing::info!(
                "{}: {} written, {} up to date, {} failed ({}ms)",
                report.task,
                report.written.len(),
                report.skipped,
                report.failures.len(),
                report.duration_ms
            );
            reports.push(report);
        }

        Ok(reports)
    }

    /// Copy the publish selection from the app directory into dist.
    pub fn copy(&self) -> Result<Vec<PathBuf>, PublishError> {
        let patterns = PatternList::new(&self.layout.publish)
            .map_err(|e| PublishError::Copy(e.into()))?;

        copy_matching(&self.layout.app_dir, &self.layout.dist_dir, &patterns)
            .map_err(PublishError::Copy)
    }
}

/// Copy every file under `from` selected by `patterns` into `to`,
/// preserving relative paths. Anything already under `to` is never a source.
pub fn copy_matching(
    from: &Path,
    to: &Path,
    patterns: &PatternList,
) -> Result<Vec<PathBuf>, TaskError> {
    let mut copied = Vec::new();
    let nested_dist = to.strip_prefix(from).ok().map(Path::to_path_buf);

    for relative in patterns.expand(from)? {
        if let Some(nested) = &nested_dist {
            if relative.starts_with(nested) {
                continue;
            }
        }

        let source = from.join(&relative);
        let target = to.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| TaskError::write(parent, e))?;
        }
        fs::copy(&source, &target).map_err(|e| TaskError::write(&target, e))?;

        tracing::debug!("Copied {}", relative.display());
        copied.push(relative);
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingTask {
        kind: TaskKind,
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Task for CountingTask {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        fn run(&self, _layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TaskError::ConfigError("boom".to_string()));
            }
            Ok(TaskReport::new(self.kind))
        }
    }

    fn touch(base: &Path, rel: &str) {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn staged_layout(temp: &tempfile::TempDir) -> ProjectLayout {
        let layout = ProjectLayout::new(temp.path().join("app"), temp.path().join("dist"));
        for rel in [
            "index.html",
            "css/main.css",
            "css/main.min.css",
            "scss/main.scss",
            "js/main.js",
            "js/main.min.js",
            "media/images/photo.avif",
            "media/images/icon.svg",
            "media/images/sprite.svg",
            "media/images/src/photo.jpg",
            "media/images/stack/sprite.stack.html",
            "fonts/Inter.woff2",
            "fonts/src/Inter.ttf",
            "pages/index.html",
        ] {
            touch(&layout.app_dir, rel);
        }
        layout
    }

    #[test]
    fn copy_follows_allow_and_deny_list() {
        let temp = tempdir().unwrap();
        let layout = staged_layout(&temp);

        let mut copied = Publisher::new(layout.clone())
            .with_tasks(vec![])
            .copy()
            .unwrap();
        copied.sort();

        let expected: Vec<PathBuf> = [
            "css/main.css",
            "css/main.min.css",
            "fonts/Inter.woff2",
            "index.html",
            "js/main.js",
            "js/main.min.js",
            "media/images/photo.avif",
            "media/images/sprite.svg",
            "pages/index.html",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(copied, expected);
        assert!(!layout.dist_dir.join("media/images/icon.svg").exists());
        assert!(!layout.dist_dir.join("scss/main.scss").exists());
    }

    #[test]
    fn build_replaces_stale_distribution() {
        let temp = tempdir().unwrap();
        let layout = staged_layout(&temp);
        touch(&layout.dist_dir, "css/old.css");

        let result = Publisher::new(layout.clone())
            .with_tasks(vec![])
            .build()
            .unwrap();

        assert!(result.cleaned);
        assert!(!layout.dist_dir.join("css/old.css").exists());
        assert!(layout.dist_dir.join("css/main.css").exists());
        assert_eq!(result.copied.len(), 9);
    }

    #[test]
    fn failing_transform_stops_before_clean() {
        let temp = tempdir().unwrap();
        let layout = staged_layout(&temp);
        touch(&layout.dist_dir, "css/previous.css");

        let runs = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<Arc<dyn Task>> = vec![
            Arc::new(CountingTask {
                kind: TaskKind::Styles,
                runs: Arc::clone(&runs),
                fail: true,
            }),
            Arc::new(CountingTask {
                kind: TaskKind::Scripts,
                runs: Arc::clone(&runs),
                fail: false,
            }),
        ];

        let err = Publisher::new(layout.clone())
            .with_tasks(tasks)
            .build()
            .unwrap_err();

        assert!(matches!(err, PublishError::Transform { task: TaskKind::Styles, .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(layout.dist_dir.join("css/previous.css").exists());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_source_fails_the_copy_phase() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let layout = staged_layout(&temp);
        let locked = layout.css_dir();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root reads through any mode bits.
        let readable = fs::read_dir(&locked).is_ok();
        let result = Publisher::new(layout.clone()).with_tasks(vec![]).copy();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        assert!(matches!(result, Err(PublishError::Copy(TaskError::ReadError { .. }))));
    }

    #[test]
    fn nested_dist_is_never_copied_into_itself() {
        let temp = tempdir().unwrap();
        let app = temp.path().join("app");
        touch(&app, "index.html");
        touch(&app, "public/stale.html");

        let patterns = PatternList::new(&["**/*.html"]).unwrap();
        let copied = copy_matching(&app, &app.join("public"), &patterns).unwrap();

        assert_eq!(copied, vec![PathBuf::from("index.html")]);
    }

    #[test]
    fn full_build_runs_real_tasks() {
        let temp = tempdir().unwrap();
        let layout = ProjectLayout::new(temp.path().join("app"), temp.path().join("dist"));
        touch(&layout.app_dir, "pages/index.html");
        fs::write(layout.app_path("pages/index.html"), "<h1>{{ page }}</h1>").unwrap();
        fs::create_dir_all(layout.css_dir()).unwrap();
        fs::write(layout.css_dir().join("main.scss"), "body { margin: 0; }").unwrap();

        let result = Publisher::new(layout.clone()).build().unwrap();

        assert_eq!(result.failures(), 0);
        assert_eq!(
            fs::read_to_string(layout.dist_dir.join("index.html")).unwrap(),
            "<h1>index</h1>"
        );
        assert!(layout.dist_dir.join("css/main.min.css").exists());
    }
}
