//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
///
/// Resolves secret references and builds the CalDAV and logging settings
/// exactly as a real run would, without contacting the server.
pub fn validate(config: &ClientConfig, url_override: Option<&str>) -> ClientResult<()> {
    config
        .logging
        .to_tracing_config(false)
        .map_err(|e| ClientError::Config(format!("invalid [logging]: {}", e)))?;

    let caldav = config
        .caldav_settings(url_override)
        .and_then(|settings| settings.to_caldav_config())
        .map_err(ClientError::Config)?;

    println!("CalDAV collection: {}", caldav.url_str());
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    let config_path = ClientConfig::default_path();
    println!("config: {}", config_path.display());
    Ok(())
}
