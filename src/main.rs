mod cli;
mod commands;
mod config;
mod error;
mod model;
mod util;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::util::parent_directory;

fn main() {
    let cli = Cli::parse();
    let config = config::load(cli.config_args());

    init_tracing(config.as_ref().ok().map(|config| config.log_path.as_path()));
    if let (Ok(_), Some(path)) = (&config, cli.config_args().config_path.as_deref()) {
        info!(path = %path.display(), "loaded pipeline config");
    }

    if let Err(err) = run(cli, config) {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: Result<PipelineConfig>) -> Result<()> {
    let config = config?;

    match cli.command {
        Some(Commands::Run(args)) => commands::run::run(args, config),
        Some(Commands::Status(args)) => commands::status::run(args, config),
        None => commands::run::run(cli.run, config),
    }
}

/// Console on stderr plus an append-only file at `log_path`.
fn init_tracing(log_path: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let mut file_error = None;
    let file_layer = log_path.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(err) => {
            file_error = Some((path.to_path_buf(), err));
            None
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .init();

    if let Some((path, err)) = file_error {
        warn!(path = %path.display(), error = %err, "log file unavailable, logging to console only");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = parent_directory(path) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
