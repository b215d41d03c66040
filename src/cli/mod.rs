//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod serve;

use crate::build::BuildContext;
use crate::config::loader::{find_config, load_config, merge_cli_overrides, CliOverrides};
use crate::config::{default_config, ConfigError};
use crate::mode::BuildMode;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// sitepipe - compile, bundle and serve a static site
#[derive(Parser, Debug)]
#[command(name = "sitepipe")]
#[command(about = "sitepipe - compile, bundle and serve a static site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Build for production (minify, compress, no source maps)
    #[arg(long, visible_alias = "prod", global = true)]
    pub production: bool,

    /// Port for the dev or preview server
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Open a browser once the server is listening
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    pub open: Option<bool>,

    /// Path to sitepipe.toml (default: searched upwards from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Delete the temp and output directories
    Clean,
    /// Compile styles, scripts and pages into the temp directory
    Compile,
    /// Compile, then serve with file watching and live reload
    Serve,
    /// Produce the deployable bundle in the output directory
    Build,
    /// Build, then preview the bundle
    Start,
}

/// Run the CLI
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_INVALID_ARGS)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            };
        }
    };
    init_tracing(cli.verbose);

    let ctx = match load_context(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    tracing::debug!(root = %ctx.project_root().display(), mode = %ctx.mode(), "loaded project");

    match cli.command {
        Commands::Clean => build::run_clean(&ctx),
        Commands::Compile => build::run_compile(&ctx),
        Commands::Build => build::run_build(&ctx),
        Commands::Serve => serve::run_serve(ctx),
        Commands::Start => serve::run_start(ctx),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sitepipe=debug" } else { "sitepipe=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Load configuration, apply flag overrides and build the shared context.
///
/// The project root is the directory holding the config file, or the
/// current directory when none is found.
fn load_context(cli: &Cli) -> Result<BuildContext, ConfigError> {
    let config_path = cli.config.clone().or_else(find_config);
    let mut config = match &config_path {
        Some(path) => {
            tracing::debug!("Using config: {}", path.display());
            load_config(Some(path))?
        }
        None => {
            tracing::debug!("No sitepipe.toml found, using defaults");
            default_config()
        }
    };

    let overrides = CliOverrides { port: cli.port, open: cli.open };
    merge_cli_overrides(&mut config, &overrides);

    let project_root = project_root(config_path.as_deref());
    let mode = BuildMode::from_env(cli.production);
    Ok(BuildContext::new(config, project_root, mode).with_verbose(cli.verbose))
}

fn project_root(config_path: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    match config_path.and_then(Path::parent) {
        Some(parent) if parent.as_os_str().is_empty() => cwd,
        Some(parent) => cwd.join(parent),
        None => cwd,
    }
}
