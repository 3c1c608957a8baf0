//! Stack-mode SVG sprite generation.

use std::fs;
use std::sync::LazyLock;
use std::time::Instant;

use minijinja::{context, Environment};
use regex::Regex;

use crate::glob::PatternList;
use crate::layout::ProjectLayout;
use crate::task::{stem_of, write_output, Task, TaskError, TaskKind, TaskReport};

static ROOT_SVG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<svg\b([^>]*?)/?>(.*)</svg>").expect("valid root pattern")
});
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"));
static VIEW_BOX: LazyLock<Regex> = LazyLock::new(|| attribute_pattern("viewBox"));
static WIDTH: LazyLock<Regex> = LazyLock::new(|| attribute_pattern("width"));
static HEIGHT: LazyLock<Regex> = LazyLock::new(|| attribute_pattern("height"));

const SPRITE_NAME: &str = "sprite.svg";

const STACK_STYLE: &str = ":root>svg{display:none}:root>svg:target{display:block}";

const EXAMPLE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Sprite stack ({{ icons | length }} icons)</title>
  <style>
    body { font-family: system-ui, sans-serif; margin: 2rem; }
    ul { display: flex; flex-wrap: wrap; gap: 1.5rem; list-style: none; padding: 0; }
    li { text-align: center; }
    img { width: 48px; height: 48px; display: block; margin: 0 auto 0.5rem; }
    code { font-size: 0.8rem; }
  </style>
</head>
<body>
  <h1>{{ sprite }}</h1>
  <ul>
  {%- for icon in icons %}
    <li><img src="../{{ sprite }}#{{ icon }}" alt="{{ icon }}"><code>#{{ icon }}</code></li>
  {%- endfor %}
  </ul>
</body>
</html>
"#;

/// A single icon extracted from a standalone SVG file.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteIcon {
    /// Fragment id (file stem)
    pub id: String,

    /// viewBox of the original root element
    pub view_box: String,

    /// Markup inside the original root element
    pub body: String,
}

/// Combines `media/images/*.svg` into `media/images/sprite.svg`.
pub struct SpriteTask;

impl Task for SpriteTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Sprite
    }

    fn run(&self, layout: &ProjectLayout) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        let mut report = TaskReport::new(TaskKind::Sprite);

        let sources = PatternList::new(&[
            "media/images/*.svg".to_string(),
            format!("!media/images/{}", SPRITE_NAME),
        ])?
        .expand(&layout.app_dir)?;

        let mut icons = Vec::new();
        for relative in sources {
            let path = layout.app_path(&relative);
            let svg = fs::read_to_string(&path).map_err(|e| TaskError::read(&path, e))?;
            match parse_icon(&stem_of(&path), &svg) {
                Ok(icon) => icons.push(icon),
                Err(message) => report.fail(&path, message),
            }
        }

        if icons.is_empty() {
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }

        let sprite_path = layout.images_dir().join(SPRITE_NAME);
        write_output(&sprite_path, render_stack(&icons))?;
        report.written.push(sprite_path);

        let example_path = layout
            .images_dir()
            .join("stack")
            .join("sprite.stack.html");
        match render_example(&icons) {
            Ok(html) => {
                write_output(&example_path, html)?;
                report.written.push(example_path);
            }
            Err(e) => report.fail(&example_path, e.to_string()),
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

/// Extract the root element's viewBox and children.
pub fn parse_icon(id: &str, svg: &str) -> Result<SpriteIcon, String> {
    let svg = COMMENT.replace_all(svg, "");
    let captures = ROOT_SVG
        .captures(&svg)
        .ok_or_else(|| "no <svg> root element".to_string())?;

    let attributes = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let view_box = match attribute(&VIEW_BOX, attributes) {
        Some(view_box) => view_box,
        None => {
            let width = attribute(&WIDTH, attributes).and_then(|w| leading_number(&w));
            let height = attribute(&HEIGHT, attributes).and_then(|h| leading_number(&h));
            match (width, height) {
                (Some(w), Some(h)) => format!("0 0 {} {}", w, h),
                _ => return Err("missing viewBox and width/height".to_string()),
            }
        }
    };

    Ok(SpriteIcon {
        id: id.to_string(),
        view_box,
        body: captures
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
    })
}

/// Matches `name="value"` as a whole attribute, so `width` skips `stroke-width`.
fn attribute_pattern(name: &str) -> Regex {
    let pattern = format!(r#"(?:^|\s){}\s*=\s*["']([^"']*)["']"#, name);
    Regex::new(&pattern).expect("valid attribute pattern")
}

fn attribute(pattern: &Regex, attributes: &str) -> Option<String> {
    pattern
        .captures(attributes)
        .map(|c| c[1].trim().to_string())
}

fn leading_number(value: &str) -> Option<String> {
    let digits: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    (!digits.is_empty()).then_some(digits)
}

/// Render icons as a stack sprite addressable by `sprite.svg#id`.
pub fn render_stack(icons: &[SpriteIcon]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?><svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    );
    out.push_str("<style>");
    out.push_str(STACK_STYLE);
    out.push_str("</style>");

    for icon in icons {
        out.push_str(&format!(
            r#"<svg viewBox="{}" id="{}">{}</svg>"#,
            icon.view_box, icon.id, icon.body
        ));
    }

    out.push_str("</svg>");
    out
}

fn render_example(icons: &[SpriteIcon]) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("sprite.stack.html", EXAMPLE_TEMPLATE)?;
    let ids: Vec<&str> = icons.iter().map(|i| i.id.as_str()).collect();
    env.get_template("sprite.stack.html")?
        .render(context! { sprite => SPRITE_NAME, icons => ids })
}
