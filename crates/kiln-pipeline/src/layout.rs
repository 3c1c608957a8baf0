//! Project directory contract and per-task settings.

use std::path::{Path, PathBuf};

/// Publish patterns used when no `[publish]` section is configured.
pub const DEFAULT_PUBLISH_PATTERNS: &[&str] = &[
    "css/**/*.css",
    "media/images/*.*",
    "!media/images/*.svg",
    "media/images/sprite.svg",
    "media/video/**/*.*",
    "fonts/*.*",
    "js/**/*.js",
    "**/*.html",
    "!media/images/stack/*.html",
];

/// Stylesheet settings.
#[derive(Debug, Clone)]
pub struct StylesConfig {
    /// Entry stylesheets, relative to the app directory
    pub entries: Vec<String>,

    /// Browserslist query used for vendor prefixing
    pub browsers: Vec<String>,

    /// File name of the concatenated, minified bundle
    pub bundle: String,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entries: vec!["css/main.scss".to_string()],
            browsers: vec!["last 10 versions".to_string()],
            bundle: "main.min.css".to_string(),
        }
    }
}

/// Script bundling settings.
#[derive(Debug, Clone)]
pub struct ScriptsConfig {
    /// Ordered source patterns, relative to the app directory
    pub sources: Vec<String>,

    /// File name of the minified bundle inside `js/`
    pub bundle: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: vec!["js/main.js".to_string()],
            bundle: "main.min.js".to_string(),
        }
    }
}

/// Image conversion settings.
#[derive(Debug, Clone)]
pub struct ImagesConfig {
    /// AVIF quality (1-100)
    pub avif_quality: u8,

    /// AVIF encoder speed (1 slowest - 10 fastest)
    pub avif_speed: u8,

    /// JPEG quality used when optimizing originals
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            avif_quality: 50,
            avif_speed: 6,
            jpeg_quality: 80,
        }
    }
}

/// Where sources live and where every task writes.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Working directory holding sources and staged output
    pub app_dir: PathBuf,

    /// Final distribution directory
    pub dist_dir: PathBuf,

    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub images: ImagesConfig,

    /// Ordered allow/deny list copied into the distribution directory
    pub publish: Vec<String>,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::new("app", "dist")
    }
}

impl ProjectLayout {
    /// Create a layout with default task settings.
    pub fn new(app_dir: impl Into<PathBuf>, dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            dist_dir: dist_dir.into(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            images: ImagesConfig::default(),
            publish: DEFAULT_PUBLISH_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// Resolve a path relative to the app directory.
    pub fn app_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.app_dir.join(relative)
    }

    pub fn scss_dir(&self) -> PathBuf {
        self.app_dir.join("scss")
    }

    pub fn css_dir(&self) -> PathBuf {
        self.app_dir.join("css")
    }

    pub fn js_dir(&self) -> PathBuf {
        self.app_dir.join("js")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.app_dir.join("media").join("images")
    }

    pub fn images_src_dir(&self) -> PathBuf {
        self.images_dir().join("src")
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.app_dir.join("fonts")
    }

    pub fn fonts_src_dir(&self) -> PathBuf {
        self.fonts_dir().join("src")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.app_dir.join("pages")
    }

    pub fn components_dir(&self) -> PathBuf {
        self.pages_dir().join("components")
    }
}
