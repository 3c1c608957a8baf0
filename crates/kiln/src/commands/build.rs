//! Distribution build commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use kiln_pipeline::{ProjectLayout, Publisher};

use crate::config::ConfigFile;

fn layout_with_output(file_config: &ConfigFile, output: Option<PathBuf>) -> ProjectLayout {
    let mut layout = file_config.layout();
    if let Some(output) = output {
        layout.dist_dir = output;
    }
    layout
}

/// Run the build command: transform, clean, copy.
pub async fn run(file_config: &ConfigFile, output: Option<PathBuf>) -> Result<()> {
    tracing::info!("Building distribution...");

    let publisher = Publisher::new(layout_with_output(file_config, output));
    let result = tokio::task::spawn_blocking(move || publisher.build())
        .await
        .context("Build aborted")??;

    let failures = result.failures();
    if failures > 0 {
        tracing::warn!("{} source(s) failed to transform", failures);
    }

    tracing::info!(
        "Published {} files in {}ms",
        result.copied.len(),
        result.duration_ms
    );
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}

/// Run the copy phase alone against the current app directory.
pub async fn copy(file_config: &ConfigFile, output: Option<PathBuf>) -> Result<()> {
    let layout = layout_with_output(file_config, output);
    let output_dir = layout.dist_dir.clone();

    let publisher = Publisher::new(layout);
    let copied = tokio::task::spawn_blocking(move || publisher.copy())
        .await
        .context("Copy aborted")??;

    tracing::info!("Copied {} files to {}", copied.len(), output_dir.display());
    Ok(())
}
