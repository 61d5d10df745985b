use anyhow::Result;
use fetch::Source;
use log::{debug, info};

use crate::analysis::{GymObesityReport, SugarDiabetesReport, TrendsReport};
use crate::config::{paths, Config};
use crate::formatters::write_table;

// Re-exports
pub use column_names as COL;

// Modules
pub mod analysis;
pub mod column_names;
pub mod config;
pub mod country;
pub mod error;
pub mod fetch;
pub mod formatters;
pub mod html;
pub mod panel;
pub mod static_merge;
pub mod stats;
pub mod stratify;
pub mod table;

/// Type for the healthtrends pipelines and the configuration they run with
pub struct HealthTrends {
    pub config: Config,
}

impl HealthTrends {
    /// Setup the HealthTrends object with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup the HealthTrends object with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self { config }
    }

    /// Fetches each source in turn and writes it to the data directory, returning the number of
    /// rows written for each
    pub async fn refresh(&self, sources: &[Source]) -> Result<Vec<(Source, usize)>> {
        self.config.ensure_dirs()?;
        let mut counts = Vec::with_capacity(sources.len());
        for source in sources {
            counts.push((*source, source.refresh(&self.config).await?));
        }
        Ok(counts)
    }

    /// Search interest before and after the pandemic declaration. Writes the chart table when
    /// the trends data is usable.
    pub async fn run_trends(&self, fetch: bool) -> Result<TrendsReport> {
        if fetch {
            self.refresh(&[Source::Trends]).await?;
        }
        let trends = Source::Trends.load(&self.config)?;
        let analysis = analysis::analyze_trends(&trends, &self.config)?;
        if let Some(mut figure) = analysis.figure {
            write_table(&mut figure, &self.config.figure_file(paths::FIG_TRENDS))?;
        }
        Ok(analysis.report)
    }

    /// Sugar consumption against diabetes prevalence. Writes the merged panel and both chart
    /// tables.
    pub async fn run_sugar_diabetes(&self, fetch: bool) -> Result<SugarDiabetesReport> {
        if fetch {
            self.refresh(&[Source::Sugar, Source::Diabetes]).await?;
        }
        let sugar = Source::Sugar.load(&self.config)?;
        let diabetes = Source::Diabetes.load(&self.config)?;
        let mut analysis = analysis::analyze_sugar_diabetes(&sugar, &diabetes, &self.config)?;

        write_table(
            &mut analysis.panel,
            &self.config.data_file(paths::FINAL_PANEL),
        )?;
        let mut figure = analysis.panel.select([
            COL::COUNTRY,
            COL::YEAR,
            COL::SUGAR_CONSUMPTION,
            COL::DIABETES_PREVALENCE,
            COL::SUGAR_GROUP,
        ])?;
        write_table(
            &mut figure,
            &self.config.figure_file(paths::FIG_SUGAR_DIABETES),
        )?;
        write_table(
            &mut analysis.top_sugar,
            &self.config.figure_file(paths::FIG_TOP_SUGAR),
        )?;
        info!("Sugar/diabetes outputs written");
        Ok(analysis.report)
    }

    /// Obesity prevalence between high and low gym penetration countries. Writes the merged
    /// chart table.
    pub async fn run_gym_obesity(&self, fetch: bool) -> Result<GymObesityReport> {
        if fetch {
            self.refresh(&[Source::Obesity, Source::Gym]).await?;
        }
        let gym = Source::Gym.load(&self.config)?;
        let obesity = Source::Obesity.load(&self.config)?;
        let mut analysis = analysis::analyze_gym_obesity(&gym, &obesity, &self.config)?;
        write_table(
            &mut analysis.merged,
            &self.config.figure_file(paths::FIG_GYM_OBESITY),
        )?;
        Ok(analysis.report)
    }
}

impl Default for HealthTrends {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.join("data"),
            figures_dir: dir.join("figures"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn gym_obesity_should_run_on_cached_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::write(
            config.data_file(paths::OBESITY),
            "Country,Obesity_Prevalence_pct\nUSA,42.0\nJapan,4.9\nIndia,3.9\nGermany,22.3\n",
        )?;
        let healthtrends = HealthTrends::new_with_config(config);
        healthtrends.refresh(&[Source::Gym]).await?;

        let report = healthtrends.run_gym_obesity(false).await?;
        assert_eq!(report.merged_rows, 4);
        assert!(report.t_test.is_some());
        let figure =
            std::fs::read_to_string(healthtrends.config.figure_file(paths::FIG_GYM_OBESITY))?;
        assert_eq!(figure.lines().count(), 5);
        assert!(figure.starts_with("Country,Gym_Penetration_pct,Obesity_Prevalence_pct"));
        Ok(())
    }

    #[tokio::test]
    async fn sugar_diabetes_should_write_all_outputs_with_missing_sources() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let healthtrends = HealthTrends::new_with_config(test_config(dir.path()));
        let report = healthtrends.run_sugar_diabetes(false).await?;
        assert_eq!(report.merged_rows, 0);
        assert_eq!(report.correlation, None);
        for path in [
            healthtrends.config.data_file(paths::FINAL_PANEL),
            healthtrends.config.figure_file(paths::FIG_SUGAR_DIABETES),
            healthtrends.config.figure_file(paths::FIG_TOP_SUGAR),
        ] {
            assert!(path.exists(), "{}", path.display());
        }
        Ok(())
    }

    #[tokio::test]
    async fn trends_without_data_should_not_write_a_figure() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let healthtrends = HealthTrends::new_with_config(test_config(dir.path()));
        let report = healthtrends.run_trends(true).await?;
        assert_eq!(report.rows, 0);
        assert!(!healthtrends
            .config
            .figure_file(paths::FIG_TRENDS)
            .exists());
        Ok(())
    }
}
