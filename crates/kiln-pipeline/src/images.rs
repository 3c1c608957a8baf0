//! Image conversion: AVIF and WebP derivatives plus optimized originals.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use rayon::prelude::*;
use regex::Regex;

use crate::freshness::needs_rebuild;
use crate::glob::PatternList;
use crate::layout::{ImagesConfig, ProjectLayout};
use crate::task::{stem_of, write_output, Task, TaskError, TaskKind, TaskReport};

static SVG_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"));
static SVG_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid whitespace pattern"));

/// Converts `media/images/src/*` into `media/images/`.
pub struct ImagesTask;

/// One file derived from a source image.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Derivative {
    Avif,
    Webp,
    Optimized,
}

/// Per-source result, merged into the task report in source order.
#[derive(Debug, Default)]
struct SourceOutcome {
    written: Vec<PathBuf>,
    skipped: usize,
    failures: Vec<String>,
}

impl Task for ImagesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Images
    }

    fn run(&self, layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        let mut report = TaskReport::new(TaskKind::Images);

        let sources: Vec<PathBuf> = PatternList::new(&["media/images/src/*.*"])?
            .expand(&layout.app_dir)?
            .into_iter()
            .map(|relative| layout.app_path(relative))
            .collect();

        let out_dir = layout.images_dir();
        let outcomes: Vec<Result<SourceOutcome, TaskError>> = sources
            .par_iter()
            .map(|source| convert_source(source, &out_dir, &layout.images))
            .collect();

        for (source, outcome) in sources.iter().zip(outcomes) {
            let outcome = outcome?;
            report.written.extend(outcome.written);
            report.skipped += outcome.skipped;
            for message in outcome.failures {
                report.fail(source, message);
            }
        }

        tracing::debug!(
            "images: {} written, {} up to date",
            report.written.len(),
            report.skipped
        );

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

/// Which derivatives a source gets, keyed by its extension.
fn derivatives_for(source: &Path) -> Vec<Derivative> {
    let ext = extension_of(source);
    match ext.as_str() {
        "svg" => vec![Derivative::Optimized],
        "avif" => vec![Derivative::Webp, Derivative::Optimized],
        "webp" => vec![Derivative::Avif, Derivative::Optimized],
        _ if ImageFormat::from_extension(&ext).is_some() => {
            vec![Derivative::Avif, Derivative::Webp, Derivative::Optimized]
        }
        _ => vec![Derivative::Optimized],
    }
}

fn output_path(source: &Path, out_dir: &Path, derivative: Derivative) -> PathBuf {
    match derivative {
        Derivative::Avif => out_dir.join(format!("{}.avif", stem_of(source))),
        Derivative::Webp => out_dir.join(format!("{}.webp", stem_of(source))),
        Derivative::Optimized => out_dir.join(source.file_name().unwrap_or_default()),
    }
}

fn convert_source(
    source: &Path,
    out_dir: &Path,
    config: &ImagesConfig,
) -> Result<SourceOutcome, TaskError> {
    let mut outcome = SourceOutcome::default();
    let mut decoded: Option<Result<DynamicImage, String>> = None;

    for derivative in derivatives_for(source) {
        let output = output_path(source, out_dir, derivative);
        if !needs_rebuild(source, &output).map_err(|e| TaskError::read(source, e))? {
            outcome.skipped += 1;
            continue;
        }

        let bytes = match derivative {
            Derivative::Optimized => optimize(source, config),
            Derivative::Avif | Derivative::Webp => {
                let image = decoded.get_or_insert_with(|| decode(source));
                match image {
                    Ok(image) if derivative == Derivative::Avif => encode_avif(image, config),
                    Ok(image) => encode_webp(image),
                    Err(message) => Err(message.clone()),
                }
            }
        };

        match bytes {
            Ok(bytes) => {
                write_output(&output, bytes)?;
                outcome.written.push(output);
            }
            Err(message) => outcome.failures.push(message),
        }
    }

    Ok(outcome)
}

fn decode(source: &Path) -> Result<DynamicImage, String> {
    image::open(source).map_err(|e| format!("decode error: {}", e))
}

/// Encode as AVIF at the configured quality.
pub fn encode_avif(image: &DynamicImage, config: &ImagesConfig) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let encoder =
        AvifEncoder::new_with_speed_quality(&mut buffer, config.avif_speed, config.avif_quality);
    DynamicImage::ImageRgba8(image.to_rgba8())
        .write_with_encoder(encoder)
        .map_err(|e| format!("AVIF encode error: {}", e))?;
    Ok(buffer)
}

/// Encode as lossless WebP.
pub fn encode_webp(image: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut buffer);
    DynamicImage::ImageRgba8(image.to_rgba8())
        .write_with_encoder(encoder)
        .map_err(|e| format!("WebP encode error: {}", e))?;
    Ok(buffer)
}

/// Produce an optimized copy, never larger than the original.
fn optimize(source: &Path, config: &ImagesConfig) -> Result<Vec<u8>, String> {
    let original = fs::read(source).map_err(|e| format!("read error: {}", e))?;

    let candidate = match extension_of(source).as_str() {
        "jpg" | "jpeg" => {
            let image = decode(source)?;
            let mut buffer = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, config.jpeg_quality);
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| format!("JPEG encode error: {}", e))?;
            buffer
        }
        "png" => {
            let image = decode(source)?;
            let mut buffer = Cursor::new(Vec::new());
            let encoder = PngEncoder::new_with_quality(
                &mut buffer,
                CompressionType::Best,
                FilterType::Adaptive,
            );
            image
                .write_with_encoder(encoder)
                .map_err(|e| format!("PNG encode error: {}", e))?;
            buffer.into_inner()
        }
        "svg" => {
            let text = String::from_utf8(original.clone())
                .map_err(|_| "SVG is not valid UTF-8".to_string())?;
            minify_svg(&text).into_bytes()
        }
        _ => return Ok(original),
    };

    if candidate.len() < original.len() {
        Ok(candidate)
    } else {
        Ok(original)
    }
}

/// Strip comments and whitespace between tags.
pub fn minify_svg(svg: &str) -> String {
    let without_comments = SVG_COMMENT.replace_all(svg, "");
    SVG_GAP
        .replace_all(&without_comments, "><")
        .trim()
        .to_string()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
