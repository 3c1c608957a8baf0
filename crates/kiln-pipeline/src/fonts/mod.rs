//! Font conversion: WOFF and WOFF2 webfonts from TrueType/OpenType sources.

pub mod sfnt;
pub mod woff;
pub mod woff2;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::freshness::needs_rebuild;
use crate::glob::PatternList;
use crate::layout::ProjectLayout;
use crate::task::{stem_of, write_output, Task, TaskError, TaskKind, TaskReport};

pub use sfnt::FontError;

/// Converts `fonts/src/*` into `fonts/`.
///
/// `.ttf` sources yield `.woff`, `.woff2` and a `.ttf` copy. `.otf` sources
/// yield `.woff` and `.woff2` only: CFF outlines are not converted to
/// TrueType, so no `.ttf` is produced for them.
pub struct FontsTask;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FontFormat {
    Woff,
    Woff2,
    Ttf,
}

impl FontFormat {
    fn extension(self) -> &'static str {
        match self {
            FontFormat::Woff => "woff",
            FontFormat::Woff2 => "woff2",
            FontFormat::Ttf => "ttf",
        }
    }
}

impl Task for FontsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Fonts
    }

    fn run(&self, layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        let mut report = TaskReport::new(TaskKind::Fonts);
        let out_dir = layout.fonts_dir();

        let sources = PatternList::new(&["fonts/src/*.*"])?.expand(&layout.app_dir)?;
        for relative in sources {
            let source = layout.app_path(&relative);
            convert_font(&source, &out_dir, &mut report)?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

fn convert_font(source: &Path, out_dir: &Path, report: &mut TaskReport) -> Result<(), TaskError> {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let formats: &[FontFormat] = match ext.as_str() {
        "ttf" => &[FontFormat::Woff, FontFormat::Woff2, FontFormat::Ttf],
        "otf" => &[FontFormat::Woff, FontFormat::Woff2],
        _ => {
            report.fail(source, format!("unsupported font format '.{}'", ext));
            return Ok(());
        }
    };

    let mut pending: Vec<(FontFormat, PathBuf)> = Vec::new();
    for &format in formats {
        let output = out_dir.join(format!("{}.{}", stem_of(source), format.extension()));
        if needs_rebuild(source, &output).map_err(|e| TaskError::read(source, e))? {
            pending.push((format, output));
        } else {
            report.skipped += 1;
        }
    }
    if pending.is_empty() {
        return Ok(());
    }

    let bytes = fs::read(source).map_err(|e| TaskError::read(source, e))?;
    let font = match sfnt::parse(&bytes) {
        Ok(font) => font,
        Err(e) => {
            report.fail(source, e.to_string());
            return Ok(());
        }
    };

    for (format, output) in pending {
        let encoded = match format {
            FontFormat::Woff => woff::encode(&font),
            FontFormat::Woff2 => woff2::encode(&font),
            FontFormat::Ttf => Ok(bytes.clone()),
        };

        match encoded {
            Ok(data) => {
                write_output(&output, data)?;
                report.written.push(output);
            }
            Err(e) => report.fail(source, e.to_string()),
        }
    }

    Ok(())
}
