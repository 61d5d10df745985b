//! Error types.

#[derive(thiserror::Error, Debug)]
pub enum HealthTrendsError {
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Column not found in table: {0}")]
    MissingColumn(String),
    #[error("Failed to fetch source data: {0}")]
    Fetch(String),
    #[error("Failed to parse source data: {0}")]
    Parse(String),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped reqwest error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Wrapped IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type HealthTrendsResult<T> = Result<T, HealthTrendsError>;

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_anyhow() {
        let anyhow_error = anyhow!("An anyhow error");
        let error: HealthTrendsError = anyhow_error.into();
        assert_eq!(error.to_string(), "Wrapped anyhow error: An anyhow error");
    }

    #[test]
    fn test_missing_column_message() {
        let error = HealthTrendsError::MissingColumn("Year".into());
        assert_eq!(error.to_string(), "Column not found in table: Year");
    }
}
