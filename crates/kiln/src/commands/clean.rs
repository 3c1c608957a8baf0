//! Distribution cleanup command.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::ConfigFile;

/// Remove the distribution directory; a missing directory is success.
pub fn run(file_config: &ConfigFile, output: Option<PathBuf>) -> Result<()> {
    let dir = output.unwrap_or_else(|| file_config.layout().dist_dir);

    if !kiln_pipeline::clean(&dir)? {
        tracing::info!("{} does not exist, nothing to clean", dir.display());
    }

    Ok(())
}
