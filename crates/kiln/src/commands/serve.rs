//! Preview server command.

use std::path::PathBuf;

use anyhow::Result;
use kiln_server::{DevServer, ReloadHub};

use crate::config::ConfigFile;
use crate::ServeArgs;

/// Run the serve command.
pub async fn run(file_config: &ConfigFile, args: ServeArgs, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| file_config.layout().dist_dir);
    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'kiln build' first.",
            dir.display()
        );
    }

    let mut config = file_config.server(dir);
    config.live_reload = false;
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_open {
        config.open = false;
    }

    DevServer::new(config, ReloadHub::new()).start().await?;

    Ok(())
}
