//! HTML page assembly from templates and shared components.

use std::fs;
use std::time::Instant;

use minijinja::{context, path_loader, Environment};

use crate::glob::PatternList;
use crate::layout::ProjectLayout;
use crate::task::{stem_of, write_output, Task, TaskError, TaskKind, TaskReport};

/// Renders `pages/*.html` into the app root.
///
/// Pages are minijinja templates; `{% include "header.html" %}` resolves
/// against `pages/components/`.
pub struct PagesTask;

impl Task for PagesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Pages
    }

    fn run(&self, layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        let mut report = TaskReport::new(TaskKind::Pages);

        let mut env = Environment::new();
        env.set_loader(path_loader(layout.components_dir()));

        let pages = PatternList::new(&["pages/*.html"])?.expand(&layout.app_dir)?;
        for relative in pages {
            let source = layout.app_path(&relative);
            let template = fs::read_to_string(&source).map_err(|e| TaskError::read(&source, e))?;
            let name = format!("{}.html", stem_of(&source));

            let rendered =
                env.render_named_str(&name, &template, context! { page => stem_of(&source) });

            match rendered {
                Ok(html) => {
                    let output = layout.app_path(&name);
                    write_output(&output, html)?;
                    report.written.push(output);
                }
                Err(e) => report.fail(&source, describe(&e)),
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

/// Flatten a template error and its causes into one line.
fn describe(err: &minijinja::Error) -> String {
    use std::error::Error as _;

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
