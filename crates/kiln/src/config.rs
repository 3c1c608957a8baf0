//! Configuration file (kiln.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiln_pipeline::ProjectLayout;
use kiln_server::DevServerConfig;
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    styles: StylesSection,
    #[serde(default)]
    scripts: ScriptsSection,
    #[serde(default)]
    images: ImagesSection,
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    publish: PublishSection,
}

#[derive(Debug, Deserialize)]
struct PathsConfig {
    #[serde(default = "default_app")]
    app: String,
    #[serde(default = "default_dist")]
    dist: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            dist: default_dist(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct StylesSection {
    entries: Option<Vec<String>>,
    /// Browserslist query for vendor prefixes
    browsers: Option<Vec<String>>,
    bundle: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ScriptsSection {
    sources: Option<Vec<String>>,
    bundle: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ImagesSection {
    avif_quality: Option<u8>,
    avif_speed: Option<u8>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_open")]
    open: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: default_open(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PublishSection {
    patterns: Option<Vec<String>>,
}

fn default_app() -> String {
    "app".to_string()
}
fn default_dist() -> String {
    "dist".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_open() -> bool {
    true
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

impl ConfigFile {
    /// Project layout with file values laid over the defaults.
    pub fn layout(&self) -> ProjectLayout {
        let mut layout = ProjectLayout::new(&self.paths.app, &self.paths.dist);

        if let Some(entries) = &self.styles.entries {
            layout.styles.entries = entries.clone();
        }
        if let Some(browsers) = &self.styles.browsers {
            layout.styles.browsers = browsers.clone();
        }
        if let Some(bundle) = &self.styles.bundle {
            layout.styles.bundle = bundle.clone();
        }
        if let Some(sources) = &self.scripts.sources {
            layout.scripts.sources = sources.clone();
        }
        if let Some(bundle) = &self.scripts.bundle {
            layout.scripts.bundle = bundle.clone();
        }
        if let Some(quality) = self.images.avif_quality {
            layout.images.avif_quality = quality;
        }
        if let Some(speed) = self.images.avif_speed {
            layout.images.avif_speed = speed;
        }
        if let Some(quality) = self.images.jpeg_quality {
            layout.images.jpeg_quality = quality;
        }
        if let Some(patterns) = &self.publish.patterns {
            layout.publish = patterns.clone();
        }

        layout
    }

    /// Dev server settings rooted at `root`.
    pub fn server(&self, root: PathBuf) -> DevServerConfig {
        DevServerConfig {
            root,
            port: self.server.port,
            host: self.server.host.clone(),
            open: self.server.open,
            live_reload: true,
        }
    }
}
