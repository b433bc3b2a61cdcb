//! calbridge CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use calbridge_caldav::CalDavClient;
use calbridge_cli::cli::{Cli, Command, ConfigAction};
use calbridge_cli::commands;
use calbridge_cli::config::ClientConfig;
use calbridge_cli::error::{ClientError, ClientResult};
use calbridge_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    // Load configuration
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path).map_err(ClientError::Config)?,
        None => ClientConfig::load().map_err(ClientError::Config)?,
    };

    let tracing_config = config
        .logging
        .to_tracing_config(cli.debug)
        .map_err(ClientError::Config)?;
    init_tracing(tracing_config)?;

    let url_override = cli.url.as_deref();

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config, url_override),
            ConfigAction::Path => commands::config::path(),
        },
        command => {
            let caldav = config
                .caldav_settings(url_override)
                .and_then(|settings| settings.to_caldav_config())
                .map_err(ClientError::Config)?;
            debug!(url = caldav.url_str(), "Using calendar collection");

            let client = CalDavClient::new(caldav)?;
            let output = commands::events::execute(&client, command).await?;
            println!("{}", output);
            Ok(())
        }
    }
}
