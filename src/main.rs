use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kpipe::cli::commands::{
    handle_config, handle_ingest, handle_search, handle_stats, handle_status,
};
use kpipe::cli::{Cli, Commands};
use kpipe::error::ConfigError;
use kpipe::models::{Config, OutputFormat};

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "kpipe=debug" } else { "kpipe=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loaded = Config::load();
    let format = cli
        .format
        .or_else(|| loaded.as_ref().ok().map(|c| c.retrieval.default_format))
        .unwrap_or_default();
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, loaded, format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    loaded: Result<Config, ConfigError>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    // config subcommands must work while the file on disk is broken
    if let Commands::Config(cmd) = command {
        return handle_config(cmd, format, verbose).await;
    }

    let config = loaded.context("failed to load configuration")?;
    match command {
        Commands::Status => handle_status(&config, format, verbose).await?,
        Commands::Ingest(args) => handle_ingest(args, &config, format, verbose).await?,
        Commands::Search(args) => handle_search(args, &config, format, verbose).await?,
        Commands::Stats => handle_stats(&config, format, verbose).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
