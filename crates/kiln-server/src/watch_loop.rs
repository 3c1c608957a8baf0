//! Maps filesystem changes to task runs and browser reloads.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use kiln_pipeline::glob::normalize;
use kiln_pipeline::{PatternError, PatternList, ProjectLayout, Task, TaskKind};

use crate::reload::{ReloadHub, ReloadMessage};
use crate::server::ServerError;
use crate::watcher::{FileWatcher, FsChange};

/// What a rule does when one of its patterns changes.
#[derive(Clone)]
pub enum WatchAction {
    /// Re-run a transform task, then notify browsers if it wrote anything
    Run(Arc<dyn Task>),

    /// Tell browsers to reload
    Reload,
}

impl fmt::Debug for WatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchAction::Run(task) => write!(f, "Run({})", task.kind()),
            WatchAction::Reload => f.write_str("Reload"),
        }
    }
}

/// A set of patterns (relative to the app directory) and its action.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pub name: String,
    pub patterns: PatternList,
    pub action: WatchAction,
}

impl WatchRule {
    /// Re-run `kind` when a path matching `patterns` changes.
    pub fn task<S: AsRef<str>>(kind: TaskKind, patterns: &[S]) -> Result<Self, PatternError> {
        Ok(Self {
            name: kind.name().to_string(),
            patterns: PatternList::new(patterns)?,
            action: WatchAction::Run(kind.task()),
        })
    }

    /// Reload browsers when a path matching `patterns` changes.
    pub fn reload<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        Ok(Self {
            name: "reload".to_string(),
            patterns: PatternList::new(patterns)?,
            action: WatchAction::Reload,
        })
    }
}

/// The standard rule set for a project layout.
///
/// A rule never matches the outputs of its own task, or a write would
/// trigger the next run.
pub fn default_rules(layout: &ProjectLayout) -> Result<Vec<WatchRule>, PatternError> {
    let mut scripts = layout.scripts.sources.clone();
    scripts.push(format!("!js/{}", layout.scripts.bundle));

    Ok(vec![
        WatchRule::task(TaskKind::Styles, &["scss/**/*.scss", "css/*.scss"])?,
        WatchRule::task(TaskKind::Images, &["media/images/src/**"])?,
        WatchRule::task(TaskKind::Scripts, &scripts)?,
        WatchRule::task(TaskKind::Pages, &["pages/**"])?,
        WatchRule::reload(&["*.html"])?,
    ])
}

/// Browser notification after a task wrote output.
fn notification_for(kind: TaskKind) -> ReloadMessage {
    match kind {
        TaskKind::Styles => ReloadMessage::Css,
        _ => ReloadMessage::Reload,
    }
}

/// The watch/rebuild loop.
///
/// Every rule gets its own worker. A change arriving while the worker's
/// task runs is queued (at most one pending run), so a task never runs
/// concurrently with itself and bursts collapse into one run.
pub struct WatchLoop {
    layout: Arc<ProjectLayout>,
    rules: Vec<WatchRule>,
    hub: ReloadHub,
    debounce: Duration,
}

impl WatchLoop {
    pub fn new(layout: ProjectLayout, rules: Vec<WatchRule>, hub: ReloadHub) -> Self {
        Self {
            layout: Arc::new(layout),
            rules,
            hub,
            debounce: Duration::from_millis(100),
        }
    }

    /// How long a worker waits for a burst of changes to settle.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Watch the app directory and dispatch changes until the process ends.
    pub async fn watch(self) -> Result<(), ServerError> {
        let root = app_root(&self.layout.app_dir);
        let (watcher, events) =
            FileWatcher::new(&[root]).map_err(|e| ServerError::WatchError(e.to_string()))?;

        tracing::info!("Watching {}", self.layout.app_dir.display());
        self.run(events).await;

        drop(watcher);
        Ok(())
    }

    /// Dispatch changes from `events` until the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<FsChange>) {
        let root = app_root(&self.layout.app_dir);

        let mut workers = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(rule_worker(
                rule.name,
                rule.action,
                rx,
                Arc::clone(&self.layout),
                self.hub.clone(),
                self.debounce,
            ));
            workers.push((rule.patterns, tx));
        }

        while let Some(change) = events.recv().await {
            let Some(relative) = relative_to(&root, &change.path) else {
                continue;
            };

            for (patterns, tx) in &workers {
                if patterns.is_match(&relative) {
                    tracing::debug!("{:?} {}", change.kind, relative);
                    // A full queue already holds a pending run.
                    let _ = tx.try_send(());
                }
            }
        }
    }
}

async fn rule_worker(
    name: String,
    action: WatchAction,
    mut triggers: mpsc::Receiver<()>,
    layout: Arc<ProjectLayout>,
    hub: ReloadHub,
    debounce: Duration,
) {
    while triggers.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while triggers.try_recv().is_ok() {}

        match &action {
            WatchAction::Reload => hub.send(ReloadMessage::Reload),
            WatchAction::Run(task) => {
                let task = Arc::clone(task);
                let layout = Arc::clone(&layout);

                match tokio::task::spawn_blocking(move || task.run(&layout)).await {
                    Ok(Ok(report)) => {
                        tracing::info!(
                            "{}: {} written, {} failed ({}ms)",
                            report.task,
                            report.written.len(),
                            report.failures.len(),
                            report.duration_ms
                        );
                        if report.changed() {
                            hub.send(notification_for(report.task));
                        }
                    }
                    Ok(Err(e)) => tracing::error!("{}: {}", name, e),
                    Err(e) => tracing::error!("{} task aborted: {}", name, e),
                }
            }
        }
    }
}

fn app_root(app_dir: &Path) -> PathBuf {
    app_dir
        .canonicalize()
        .unwrap_or_else(|_| app_dir.to_path_buf())
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kiln_pipeline::{TaskError, TaskReport};
    use tempfile::tempdir;

    use crate::watcher::ChangeKind;

    /// Records how many runs overlap.
    struct SlowTask {
        active: AtomicUsize,
        max_active: AtomicUsize,
        runs: AtomicUsize,
    }

    impl SlowTask {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                runs: AtomicUsize::new(0),
            }
        }
    }

    impl Task for SlowTask {
        fn kind(&self) -> TaskKind {
            TaskKind::Styles
        }

        fn run(&self, _layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);

            let mut report = TaskReport::new(TaskKind::Styles);
            report.written.push(PathBuf::from("css/main.css"));
            Ok(report)
        }
    }

    fn change(root: &Path, rel: &str) -> FsChange {
        FsChange {
            path: root.join(rel),
            kind: ChangeKind::Modified,
        }
    }

    #[test]
    fn default_rules_route_sources() {
        let layout = ProjectLayout::default();
        let rules = default_rules(&layout).unwrap();

        let matching = |rel: &str| -> Vec<String> {
            rules
                .iter()
                .filter(|r| r.patterns.is_match(rel))
                .map(|r| r.name.clone())
                .collect()
        };

        assert_eq!(matching("scss/_buttons.scss"), vec!["styles"]);
        assert_eq!(matching("media/images/src/photo.jpg"), vec!["images"]);
        assert_eq!(matching("js/main.js"), vec!["scripts"]);
        assert_eq!(matching("pages/components/header.html"), vec!["pages"]);
        assert_eq!(matching("index.html"), vec!["reload"]);
        assert!(matching("css/main.css").is_empty());
        assert!(matching("media/images/photo.avif").is_empty());
    }

    #[test]
    fn scripts_rule_ignores_its_bundle() {
        let mut layout = ProjectLayout::default();
        layout.scripts.sources = vec!["js/**/*.js".to_string()];
        let rules = default_rules(&layout).unwrap();
        let scripts = rules.iter().find(|r| r.name == "scripts").unwrap();

        assert!(scripts.patterns.is_match("js/main.js"));
        assert!(scripts.patterns.is_match("js/vendor/slider.js"));
        assert!(!scripts.patterns.is_match("js/main.min.js"));
    }

    #[tokio::test]
    async fn one_script_edit_settles_after_one_rebuild() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("js")).unwrap();
        fs::write(root.join("js/main.js"), "console.log(1);\n").unwrap();

        let mut layout = ProjectLayout::new(&root, root.join("dist"));
        layout.scripts.sources = vec!["js/*.js".to_string()];
        let rules = default_rules(&layout).unwrap();
        let hub = ReloadHub::new();
        let mut browser = hub.subscribe();

        let watch = WatchLoop::new(layout, rules, hub).with_debounce(Duration::from_millis(50));
        let handle = tokio::spawn(watch.watch());
        tokio::time::sleep(Duration::from_millis(300)).await;

        fs::write(root.join("js/main.js"), "console.log(2);\n").unwrap();

        let mut reloads = 0;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(1500);
        while let Ok(Ok(msg)) = tokio::time::timeout_at(deadline, browser.recv()).await {
            assert_eq!(msg, ReloadMessage::Reload);
            reloads += 1;
        }
        handle.abort();

        assert!(root.join("js/main.min.js").exists());
        assert!((1..=2).contains(&reloads), "{} reloads after one edit", reloads);
    }

    #[tokio::test]
    async fn reload_rule_notifies_browsers() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let layout = ProjectLayout::new(&root, root.join("dist"));
        let hub = ReloadHub::new();
        let mut browser = hub.subscribe();

        let watch = WatchLoop::new(layout, vec![WatchRule::reload(&["*.html"]).unwrap()], hub)
            .with_debounce(Duration::from_millis(10));
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(watch.run(rx));

        tx.send(change(&root, "css/main.css")).await.unwrap();
        tx.send(change(&root, "index.html")).await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), browser.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg, ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn bursts_never_run_a_task_concurrently() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("scss")).unwrap();
        let layout = ProjectLayout::new(&root, root.join("dist"));
        let hub = ReloadHub::new();
        let mut browser = hub.subscribe();

        let task = Arc::new(SlowTask::new());
        let rule = WatchRule {
            name: "styles".to_string(),
            patterns: PatternList::new(&["scss/*.scss"]).unwrap(),
            action: WatchAction::Run(task.clone()),
        };

        let watch =
            WatchLoop::new(layout, vec![rule], hub).with_debounce(Duration::from_millis(5));
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(watch.run(rx));

        for _ in 0..3 {
            for _ in 0..10 {
                tx.send(change(&root, "scss/main.scss")).await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        let runs = task.runs.load(Ordering::SeqCst);
        assert!(runs >= 1 && runs < 30, "unexpected run count {}", runs);
        assert_eq!(task.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(browser.try_recv().unwrap(), ReloadMessage::Css);
    }
}
