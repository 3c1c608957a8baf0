//! SCSS compilation, vendor prefixing and CSS minification.

use std::path::Path;
use std::time::Instant;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::layout::ProjectLayout;
use crate::task::{stem_of, write_output, Task, TaskError, TaskKind, TaskReport};

/// Compiles the entry stylesheets into `css/`.
///
/// Entries default to `css/main.scss`; partials resolve against `scss/`.
pub struct StylesTask;

impl Task for StylesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Styles
    }

    fn run(&self, layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        let mut report = TaskReport::new(TaskKind::Styles);

        let targets = resolve_targets(&layout.styles.browsers)?;
        let css_dir = layout.css_dir();
        let mut bundle = Vec::new();

        for entry in &layout.styles.entries {
            let source = layout.app_path(entry);
            if !source.is_file() {
                tracing::debug!("Stylesheet entry not found: {}", source.display());
                continue;
            }

            let compiled = compile_scss(&source, &layout.scss_dir())
                .and_then(|css| prefix_css(&css, targets, false));

            match compiled {
                Ok(css) => {
                    let output = css_dir.join(format!("{}.css", stem_of(&source)));
                    write_output(&output, &css)?;
                    report.written.push(output);
                    bundle.push(css);
                }
                Err(message) => report.fail(&source, message),
            }
        }

        if !bundle.is_empty() {
            let concatenated = bundle.join("\n");
            match prefix_css(&concatenated, targets, true) {
                Ok(minified) => {
                    let output = css_dir.join(&layout.styles.bundle);
                    write_output(&output, minified)?;
                    report.written.push(output);
                }
                Err(message) => report.fail(&css_dir.join(&layout.styles.bundle), message),
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

/// Turn a browserslist query into lightningcss targets.
fn resolve_targets(query: &[String]) -> Result<Targets, TaskError> {
    if query.is_empty() {
        return Ok(Targets::default());
    }

    let browsers = Browsers::from_browserslist(query)
        .map_err(|e| TaskError::ConfigError(format!("browserslist: {}", e)))?;

    Ok(Targets {
        browsers,
        ..Default::default()
    })
}

/// Compile one SCSS entry to expanded CSS.
pub fn compile_scss(source: &Path, load_path: &Path) -> Result<String, String> {
    let options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .load_path(load_path);

    grass::from_path(source, &options).map_err(|e| e.to_string())
}

/// Add vendor prefixes for `targets`, optionally minifying the result.
pub fn prefix_css(css: &str, targets: Targets, minify: bool) -> Result<String, String> {
    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| format!("CSS parse error: {}", e))?;

    stylesheet
        .minify(MinifyOptions {
            targets,
            ..Default::default()
        })
        .map_err(|e| format!("CSS transform error: {}", e))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..Default::default()
        })
        .map_err(|e| format!("CSS print error: {}", e))?;

    Ok(printed.code)
}
