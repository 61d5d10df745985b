mod cli;
mod display;
mod error;

use std::path::Path;

use clap::Parser;
use cli::{Cli, RunCommand};
use error::{HealthTrendsCliError, HealthTrendsCliResult};
use healthtrends::config::Config;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

#[tokio::main]
async fn main() -> HealthTrendsCliResult<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let config: Config = read_config_from_toml()?;
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        // Return ok if pipe is closed instead of error, otherwise return error
        if let Err(err) = command.run(config).await {
            if let HealthTrendsCliError::IOError(err) = &err {
                if err.kind() == std::io::ErrorKind::BrokenPipe {
                    return Ok(());
                }
            }
            Err(err)?;
        }
    }
    Ok(())
}

fn read_config_from_toml() -> HealthTrendsCliResult<Config> {
    // macOS: ~/Library/Application Support/healthtrends/config.toml
    let file_path = dirs::config_dir()
        .ok_or(HealthTrendsCliError::NoConfigDir)?
        .join("healthtrends")
        .join("config.toml");
    read_config_file(&file_path)
}

/// Config from `file_path`, or the default config when the file does not exist
fn read_config_file(file_path: &Path) -> HealthTrendsCliResult<Config> {
    match std::fs::read_to_string(file_path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}
