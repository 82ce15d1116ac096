use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tripmate_cli::{commands, default_filter, error, AppState, Cli};
use tripmate_store::app_config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("{}", error::notice(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_from(
        &cli.config_dir,
        config::Environment::with_prefix("TRIPMATE").separator("__"),
    )
    .with_context(|| format!("Failed to load config from {}", cli.config_dir.display()))?;
    tracing::info!(
        "Using API {} as {}",
        config.api.base_url,
        config.identity.nickname
    );

    let state = AppState::from_config(&config).context("Failed to set up the API client")?;
    commands::run(&state, cli.command).await
}
