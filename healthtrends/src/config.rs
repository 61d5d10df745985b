use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// This module contains the names of the files read and written under the data and figures
/// directories.
pub mod paths {
    pub const TRENDS: &str = "data_trends_google_v2.csv";
    pub const SUGAR: &str = "data_sugar_cleaned_v2.csv";
    pub const DIABETES: &str = "data_diabetes_wb_v2.csv";
    pub const OBESITY: &str = "data_obesity_scraped_v2.csv";
    pub const GYM: &str = "data_gym_manual_v2.csv";
    pub const FINAL_PANEL: &str = "final_project_dataset_panel.csv";

    pub const FIG_SUGAR_DIABETES: &str = "fig1_sugar_diabetes.csv";
    pub const FIG_GYM_OBESITY: &str = "fig2_gym_obesity.csv";
    pub const FIG_TRENDS: &str = "fig3_trends.csv";
    pub const FIG_TOP_SUGAR: &str = "fig4_top_sugar.csv";
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub figures_dir: PathBuf,
    /// Food balance export downloaded by hand from FAOSTAT.
    pub faostat_filename: String,
    /// Google Trends "Download CSV" export, placed in `data_dir`.
    pub trends_export_filename: String,
    pub world_bank_base_url: String,
    pub diabetes_indicator: String,
    pub world_bank_start_year: i32,
    pub world_bank_end_year: i32,
    /// Inclusive range as `START END`, both `%Y-%m-%d`.
    pub trends_timeframe: String,
    pub keywords: Vec<String>,
    pub obesity_url: String,
    pub pandemic_declared: NaiveDate,
    pub top_n: usize,
    pub significance_level: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: "data".into(),
            figures_dir: "figures".into(),
            faostat_filename: "FAOSTAT_data_en_12-18-2025.csv".into(),
            trends_export_filename: "multiTimeline.csv".into(),
            world_bank_base_url: "https://api.worldbank.org/v2".into(),
            diabetes_indicator: "SH.STA.DIAB.ZS".into(),
            world_bank_start_year: 2010,
            world_bank_end_year: 2024,
            trends_timeframe: "2018-01-01 2024-12-31".into(),
            keywords: vec!["home workout".into(), "gym membership".into()],
            obesity_url: "https://worldpopulationreview.com/country-rankings/obesity-rates-by-country"
                .into(),
            pandemic_declared: NaiveDate::from_ymd_opt(2020, 3, 11).unwrap_or_default(),
            top_n: 10,
            significance_level: 0.05,
        }
    }
}

impl Config {
    pub fn data_file(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    pub fn figure_file(&self, file_name: &str) -> PathBuf {
        self.figures_dir.join(file_name)
    }

    pub fn faostat_path(&self) -> PathBuf {
        self.data_file(&self.faostat_filename)
    }

    pub fn trends_export_path(&self) -> PathBuf {
        self.data_file(&self.trends_export_filename)
    }

    /// Create the data and figures directories if they do not exist yet
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.figures_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Column names the keywords take in the cleaned trends table, e.g. `home workout` becomes
    /// `home_workout`.
    pub fn keyword_columns(&self) -> Vec<String> {
        self.keywords.iter().map(|k| clean_column_name(k)).collect()
    }

    pub fn trends_range(&self) -> anyhow::Result<(NaiveDate, NaiveDate)> {
        let mut parts = self.trends_timeframe.split_whitespace();
        let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!(
                "Invalid trends timeframe '{}', expected 'START END'",
                self.trends_timeframe
            ));
        };
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .with_context(|| format!("Invalid date in trends timeframe: {value}"))
        };
        let (start, end) = (parse(start)?, parse(end)?);
        if start > end {
            return Err(anyhow!("Trends timeframe starts after it ends: {start} > {end}"));
        }
        Ok((start, end))
    }
}

/// Lowercases a header and joins its words with underscores.
pub fn clean_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}
