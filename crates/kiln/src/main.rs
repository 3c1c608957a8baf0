//! kiln CLI - static asset build pipeline with a live-reload dev server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_pipeline::TaskKind;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Static asset build pipeline with a live-reload dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile SCSS entries to prefixed CSS and a minified bundle
    Styles,

    /// Concatenate and minify scripts
    Scripts,

    /// Produce AVIF, WebP and optimized derivatives of source images
    Images,

    /// Combine standalone SVG icons into a stack sprite
    Sprite,

    /// Convert source fonts to WOFF and WOFF2
    Fonts,

    /// Assemble HTML pages from templates and components
    Pages,

    /// Copy the publish selection into the distribution directory
    Building {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve the app directory and rebuild on change
    Watching(ServeArgs),

    /// Remove the distribution directory
    Clean {
        /// Directory to remove (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transform everything, then replace the distribution directory
    Build {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run styles, scripts, images and pages once, then serve and watch
    Watch(ServeArgs),

    /// Preview the built distribution
    Serve {
        #[command(flatten)]
        args: ServeArgs,

        /// Directory to serve (defaults to config or "dist")
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on (defaults to config or 3000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not open browser
    #[arg(long)]
    no_open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let file_config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Styles => commands::task::run(&file_config, TaskKind::Styles).await?,
        Commands::Scripts => commands::task::run(&file_config, TaskKind::Scripts).await?,
        Commands::Images => commands::task::run(&file_config, TaskKind::Images).await?,
        Commands::Sprite => commands::task::run(&file_config, TaskKind::Sprite).await?,
        Commands::Fonts => commands::task::run(&file_config, TaskKind::Fonts).await?,
        Commands::Pages => commands::task::run(&file_config, TaskKind::Pages).await?,
        Commands::Building { output } => {
            commands::build::copy(&file_config, output).await?;
        }
        Commands::Watching(args) => {
            commands::watch::run(&file_config, args, false).await?;
        }
        Commands::Clean { output } => {
            commands::clean::run(&file_config, output)?;
        }
        Commands::Build { output } => {
            commands::build::run(&file_config, output).await?;
        }
        Commands::Watch(args) => {
            commands::watch::run(&file_config, args, true).await?;
        }
        Commands::Serve { args, dir } => {
            commands::serve::run(&file_config, args, dir).await?;
        }
    }

    Ok(())
}
