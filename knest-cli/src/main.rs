use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;

use cli::{Args, Mode};
use config::Config;

/// Initialize tracing with two outputs:
/// 1. stderr, so stdout stays reserved for command output
/// 2. `<log_dir>/knest.log` for later inspection
fn initialize_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "knest=info,knest_orchestrations=info,kube=warn".into());

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::never(log_dir, "knest.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Dropping the guard stops file logging
    Ok(guard)
}

async fn run(args: Args, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let namespace = args.target_namespace;
    match args.mode {
        Mode::Create { name, flags } => {
            commands::cluster::run_create(config, cancel, namespace, name, flags).await
        }
        Mode::Delete { name } => commands::cluster::run_delete(config, cancel, namespace, name).await,
        Mode::List { output } => commands::cluster::run_list(namespace, output).await,
        Mode::Scale {
            name,
            control_plane_machine_count,
            worker_machine_count,
        } => {
            commands::cluster::run_scale(
                config,
                cancel,
                namespace,
                name,
                control_plane_machine_count,
                worker_machine_count,
            )
            .await
        }
        Mode::Version { output } => commands::version::run_version(output),
    }
}

/// Modes that need neither a home directory nor logging
fn run_standalone(mode: &Mode) -> Option<Result<()>> {
    match mode {
        Mode::Version { output } => Some(commands::version::run_version(output.clone())),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(result) = run_standalone(&args.mode) {
        return result;
    }

    let config = Config::load()?;
    let _guard = initialize_tracing(&config.log_dir)?;

    let cancel = CancellationToken::new();
    tokio::select! {
        result = run(args, &config, &cancel) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
            anyhow::bail!("interrupted")
        }
    }
}
