//! Script concatenation and minification.

use std::fs;
use std::time::Instant;

use crate::glob::PatternList;
use crate::layout::ProjectLayout;
use crate::task::{write_output, Task, TaskError, TaskKind, TaskReport};

/// Bundles the configured scripts into `js/<bundle>`.
pub struct ScriptsTask;

impl Task for ScriptsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Scripts
    }

    fn run(&self, layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        let mut report = TaskReport::new(TaskKind::Scripts);

        let output = layout.js_dir().join(&layout.scripts.bundle);
        let patterns = PatternList::new(&layout.scripts.sources)?;

        let mut parts = Vec::new();
        for relative in patterns.expand(&layout.app_dir)? {
            let path = layout.app_path(&relative);
            // The bundle lives next to its sources.
            if path == output {
                continue;
            }
            let source = fs::read_to_string(&path).map_err(|e| TaskError::read(&path, e))?;
            parts.push(source);
        }

        if !parts.is_empty() {
            let bundle = minify_js(&parts.join("\n"));
            write_output(&output, bundle)?;
            report.written.push(output);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

/// Minify JavaScript source.
pub fn minify_js(source: &str) -> String {
    minifier::js::minify(source).to_string()
}
