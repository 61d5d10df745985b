use healthtrends::error::HealthTrendsError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum HealthTrendsCliError {
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("healthtrends error: {0}")]
    HealthTrendsError(#[from] HealthTrendsError),
    #[error("Invalid TOML in config file: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Config directory could not be determined")]
    NoConfigDir,
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type HealthTrendsCliResult<T> = Result<T, HealthTrendsCliError>;
