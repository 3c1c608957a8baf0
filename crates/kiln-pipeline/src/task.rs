//! The Transform Task contract shared by every asset class.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::glob::PatternError;
use crate::layout::ProjectLayout;

/// Every transform task kiln knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Styles,
    Scripts,
    Images,
    Sprite,
    Fonts,
    Pages,
}

impl TaskKind {
    /// All tasks in the order a full build runs them.
    ///
    /// Images precede sprite because the sprite reads optimized SVGs.
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Styles,
        TaskKind::Scripts,
        TaskKind::Images,
        TaskKind::Sprite,
        TaskKind::Fonts,
        TaskKind::Pages,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Styles => "styles",
            TaskKind::Scripts => "scripts",
            TaskKind::Images => "images",
            TaskKind::Sprite => "sprite",
            TaskKind::Fonts => "fonts",
            TaskKind::Pages => "pages",
        }
    }

    /// The task implementation for this kind.
    pub fn task(self) -> Arc<dyn Task> {
        match self {
            TaskKind::Styles => Arc::new(crate::styles::StylesTask),
            TaskKind::Scripts => Arc::new(crate::scripts::ScriptsTask),
            TaskKind::Images => Arc::new(crate::images::ImagesTask),
            TaskKind::Sprite => Arc::new(crate::sprite::SpriteTask),
            TaskKind::Fonts => Arc::new(crate::fonts::FontsTask),
            TaskKind::Pages => Arc::new(crate::pages::PagesTask),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("Unknown task: {}", s))
    }
}

/// A source that could not be transformed during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformFailure {
    /// Source file that failed
    pub source: PathBuf,

    /// Message from the underlying transform
    pub message: String,
}

/// Outcome of one task run.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: TaskKind,

    /// Outputs written during this run
    pub written: Vec<PathBuf>,

    /// Outputs left alone because they were already up to date
    pub skipped: usize,

    /// Sources that failed to transform
    pub failures: Vec<TransformFailure>,

    /// Run time in milliseconds
    pub duration_ms: u64,
}

impl TaskReport {
    pub fn new(task: TaskKind) -> Self {
        Self {
            task,
            written: Vec::new(),
            skipped: 0,
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Record and log a transform failure; the run carries on.
    pub fn fail(&mut self, source: &Path, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("[{}] {}: {}", self.task, source.display(), message);
        self.failures.push(TransformFailure {
            source: source.to_path_buf(),
            message,
        });
    }

    /// Whether the run changed anything on disk.
    pub fn changed(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Fatal errors that stop a task run.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("Failed to remove {path}: {message}")]
    RemoveError { path: String, message: String },

    #[error("Task configuration error: {0}")]
    ConfigError(String),
}

impl TaskError {
    pub(crate) fn read(path: &Path, err: impl fmt::Display) -> Self {
        TaskError::ReadError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, err: impl fmt::Display) -> Self {
        TaskError::WriteError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// A named pipeline turning Source Files into Staged Outputs.
pub trait Task: Send + Sync {
    /// Which task this is.
    fn kind(&self) -> TaskKind;

    /// Run the pipeline once over the current sources.
    fn run(&self, layout: &ProjectLayout) -> Result<TaskReport, TaskError>;
}

/// Write `contents` to `path`, creating parent directories as needed.
pub(crate) fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::write(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| TaskError::write(path, e))
}

/// File stem of `path` as an owned string.
pub(crate) fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}
