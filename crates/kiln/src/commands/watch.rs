//! Development server and watch loop commands.

use anyhow::{Context, Result};
use kiln_pipeline::TaskKind;
use kiln_server::{default_rules, DevServer, ReloadHub, WatchLoop};
use tokio::task::JoinSet;

use crate::commands::task::{log_report, run_blocking};
use crate::config::ConfigFile;
use crate::ServeArgs;

/// Tasks run once before watching starts.
const INITIAL_TASKS: [TaskKind; 4] = [
    TaskKind::Styles,
    TaskKind::Scripts,
    TaskKind::Images,
    TaskKind::Pages,
];

/// Serve the app directory and rebuild on change.
///
/// With `initial` set, styles, scripts, images and pages run concurrently
/// once before the server starts.
pub async fn run(file_config: &ConfigFile, args: ServeArgs, initial: bool) -> Result<()> {
    let layout = file_config.layout();

    if initial {
        let mut runs = JoinSet::new();
        for kind in INITIAL_TASKS {
            runs.spawn(run_blocking(layout.clone(), kind));
        }
        while let Some(joined) = runs.join_next().await {
            let report = joined.context("Initial build aborted")??;
            log_report(&report);
        }
    }

    let mut config = file_config.server(layout.app_dir.clone());
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_open {
        config.open = false;
    }

    let hub = ReloadHub::new();
    let rules = default_rules(&layout)?;
    let watch_loop = WatchLoop::new(layout, rules, hub.clone());
    let server = DevServer::new(config, hub);

    tokio::select! {
        result = server.start() => result?,
        result = watch_loop.watch() => result?,
    }

    Ok(())
}
