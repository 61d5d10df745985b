//! The three research questions, each as a pure function from source tables to a report plus
//! the tables it writes out.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;

use crate::config::Config;
use crate::country::standardize_country_names;
use crate::error::HealthTrendsResult;
use crate::panel::{merge_panels, MergedPanelRow};
use crate::static_merge::merge_static;
use crate::stats::{group_means, mean, pearson, welch_t_test, Correlation, GroupMean, TTest};
use crate::stratify::{MedianSplit, QuantileBins, Stratifier, Stratify};
use crate::table::{column, PanelSeries, StaticSeries, TableReport};
use crate::COL;

pub const BEFORE_PANDEMIC: &str = "Before pandemic";
pub const AFTER_PANDEMIC: &str = "After pandemic";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordMean {
    pub keyword: String,
    pub mean: Option<f64>,
}

/// Search interest on either side of the pandemic declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub period: String,
    pub rows: usize,
    pub keyword_means: Vec<KeywordMean>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendsReport {
    pub rows: usize,
    pub keywords: Vec<String>,
    /// Keyword columns the trends table lacks; nothing is computed when non-empty
    pub missing_columns: Vec<String>,
    /// Between the first two keywords
    pub correlation: Option<Correlation>,
    pub periods: Vec<PeriodSummary>,
}

#[derive(Debug, Clone)]
pub struct TrendsAnalysis {
    pub report: TrendsReport,
    /// `date`, one column per keyword and `period`; absent when the data is missing
    pub figure: Option<DataFrame>,
}

/// Correlates interest in the configured keywords and compares it before and after the
/// pandemic was declared.
pub fn analyze_trends(trends: &DataFrame, config: &Config) -> HealthTrendsResult<TrendsAnalysis> {
    let keywords = config.keyword_columns();
    let missing_columns: Vec<String> = keywords
        .iter()
        .filter(|k| trends.column(k).is_err())
        .cloned()
        .collect();
    let mut report = TrendsReport {
        rows: trends.height(),
        keywords: keywords.clone(),
        missing_columns,
        correlation: None,
        periods: vec![],
    };
    if !report.missing_columns.is_empty() || trends.height() == 0 {
        warn!(
            "Trends data is empty or missing columns {:?}",
            report.missing_columns
        );
        return Ok(TrendsAnalysis {
            report,
            figure: None,
        });
    }

    let dates: Vec<Option<NaiveDate>> = column(trends, COL::DATE)?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|d| d.and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()))
        .collect();
    let interest: Vec<Vec<Option<f64>>> = keywords
        .iter()
        .map(|k| -> HealthTrendsResult<Vec<Option<f64>>> {
            Ok(column(trends, k)?
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.filter(|v| v.is_finite()))
                .collect())
        })
        .collect::<HealthTrendsResult<_>>()?;

    if let [first, second, ..] = interest.as_slice() {
        let (x, y): (Vec<f64>, Vec<f64>) = first
            .iter()
            .zip(second)
            .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
            .unzip();
        report.correlation = pearson(&x, &y);
    }

    let period_of = |date: &Option<NaiveDate>| {
        date.map(|d| {
            if d < config.pandemic_declared {
                BEFORE_PANDEMIC
            } else {
                AFTER_PANDEMIC
            }
        })
    };
    let periods: Vec<Option<&str>> = dates.iter().map(period_of).collect();
    report.periods = [BEFORE_PANDEMIC, AFTER_PANDEMIC]
        .into_iter()
        .map(|period| {
            let in_period: Vec<bool> = periods.iter().map(|p| *p == Some(period)).collect();
            PeriodSummary {
                period: period.to_string(),
                rows: in_period.iter().filter(|b| **b).count(),
                keyword_means: keywords
                    .iter()
                    .zip(&interest)
                    .map(|(keyword, values)| {
                        let values: Vec<f64> = values
                            .iter()
                            .zip(&in_period)
                            .filter_map(|(v, keep)| v.filter(|_| *keep))
                            .collect();
                        KeywordMean {
                            keyword: keyword.clone(),
                            mean: mean(&values),
                        }
                    })
                    .collect(),
            }
        })
        .collect();

    let mut figure_columns = vec![column(trends, COL::DATE)?.clone()];
    for (keyword, values) in keywords.iter().zip(&interest) {
        figure_columns.push(Series::new(keyword, values));
    }
    figure_columns.push(Series::new(COL::PERIOD, periods));
    info!(
        "Trends: {} rows, correlation {:?}",
        report.rows,
        report.correlation.map(|c| c.r)
    );

    Ok(TrendsAnalysis {
        report,
        figure: Some(DataFrame::new(figure_columns)?),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryMean {
    pub country: String,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SugarDiabetesReport {
    pub sugar_rows: TableReport,
    pub diabetes_rows: TableReport,
    pub merged_rows: usize,
    pub countries: usize,
    /// Sugar consumption bounds between the Low/Medium and Medium/High groups
    pub sugar_cut_points: Vec<f64>,
    /// Mean diabetes prevalence in each sugar group
    pub diabetes_by_group: Vec<GroupMean>,
    pub correlation: Option<Correlation>,
    pub top_sugar: Vec<CountryMean>,
}

#[derive(Debug, Clone)]
pub struct SugarDiabetesAnalysis {
    pub report: SugarDiabetesReport,
    /// The merged panel with each row's sugar group
    pub panel: DataFrame,
    /// `Country` and `Avg_Sugar_Consumption_kg` of the top consumers
    pub top_sugar: DataFrame,
}

/// Relates sugar consumption to diabetes prevalence over country-years.
pub fn analyze_sugar_diabetes(
    sugar: &DataFrame,
    diabetes: &DataFrame,
    config: &Config,
) -> HealthTrendsResult<SugarDiabetesAnalysis> {
    let sugar = panel_series(sugar, COL::SUGAR_CONSUMPTION)?;
    let diabetes = panel_series(diabetes, COL::DIABETES_PREVALENCE)?;
    let merged = merge_panels(&sugar, &diabetes);
    info!("Sugar/diabetes: {} merged records", merged.len());

    let sugar_values = merged.left_values();
    let diabetes_values = merged.right_values();
    let strata = Stratifier::from(QuantileBins::tertiles()).stratify(&sugar_values);
    let top_sugar = top_countries(&merged.rows, config.top_n);

    let mut panel = merged.to_dataframe()?;
    panel.with_column(Series::new(COL::SUGAR_GROUP, strata.row_labels()))?;
    let (countries, averages): (Vec<&str>, Vec<f64>) = top_sugar
        .iter()
        .map(|c| (c.country.as_str(), c.mean))
        .unzip();
    let top_sugar_table = DataFrame::new(vec![
        Series::new(COL::COUNTRY, countries),
        Series::new(COL::AVG_SUGAR_CONSUMPTION, averages),
    ])?;

    let report = SugarDiabetesReport {
        sugar_rows: sugar.report,
        diabetes_rows: diabetes.report,
        merged_rows: merged.len(),
        countries: merged
            .rows
            .iter()
            .map(|r| r.canonical_name.as_str())
            .collect::<HashSet<_>>()
            .len(),
        sugar_cut_points: strata.cut_points.clone(),
        diabetes_by_group: group_means(&diabetes_values, &strata),
        correlation: pearson(&sugar_values, &diabetes_values),
        top_sugar,
    };
    Ok(SugarDiabetesAnalysis {
        report,
        panel,
        top_sugar: top_sugar_table,
    })
}

/// The `n` display countries with the highest mean left metric, highest first.
fn top_countries(rows: &[MergedPanelRow], n: usize) -> Vec<CountryMean> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.country.as_str()).or_default();
        entry.0 += row.left;
        entry.1 += 1;
    }
    let mut means: Vec<CountryMean> = totals
        .into_iter()
        .map(|(country, (sum, count))| CountryMean {
            country: country.to_string(),
            mean: sum / count as f64,
        })
        .collect();
    // Stable sort keeps ties in alphabetical order
    means.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    means.truncate(n);
    means
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GymObesityReport {
    pub gym_rows: TableReport,
    pub obesity_rows: TableReport,
    pub merged_rows: usize,
    pub median_gym_penetration: Option<f64>,
    /// Mean obesity prevalence in each gym group
    pub obesity_by_group: Vec<GroupMean>,
    /// High gym penetration group against the low one
    pub t_test: Option<TTest>,
    pub significance_level: f64,
    pub significant: Option<bool>,
    pub correlation: Option<Correlation>,
}

#[derive(Debug, Clone)]
pub struct GymObesityAnalysis {
    pub report: GymObesityReport,
    /// The merged table with each country's gym group
    pub merged: DataFrame,
}

/// Compares obesity prevalence between countries with high and low gym penetration.
pub fn analyze_gym_obesity(
    gym: &DataFrame,
    obesity: &DataFrame,
    config: &Config,
) -> HealthTrendsResult<GymObesityAnalysis> {
    let gym = static_series(gym, COL::GYM_PENETRATION)?;
    let obesity = static_series(obesity, COL::OBESITY_PREVALENCE)?;
    let merged = merge_static(&gym, &obesity);
    info!("Gym/obesity: {} merged records", merged.len());

    let gym_values = merged.left_values();
    let obesity_values = merged.right_values();
    let strata = Stratifier::from(MedianSplit::default()).stratify(&gym_values);
    let t_test = welch_t_test(
        &strata.members(MedianSplit::HIGH, &obesity_values),
        &strata.members(MedianSplit::LOW, &obesity_values),
    );
    if t_test.is_none() {
        warn!("Not enough countries in each gym group for a t-test");
    }

    let mut table = merged.to_dataframe()?;
    table.with_column(Series::new(COL::GYM_GROUP, strata.row_labels()))?;

    let report = GymObesityReport {
        gym_rows: gym.report,
        obesity_rows: obesity.report,
        merged_rows: merged.len(),
        median_gym_penetration: strata.cut_points.first().copied(),
        obesity_by_group: group_means(&obesity_values, &strata),
        significance_level: config.significance_level,
        significant: t_test.map(|t| t.is_significant(config.significance_level)),
        t_test,
        correlation: pearson(&gym_values, &obesity_values),
    };
    Ok(GymObesityAnalysis {
        report,
        merged: table,
    })
}

fn panel_series(df: &DataFrame, metric: &str) -> HealthTrendsResult<PanelSeries> {
    let mut df = df.clone();
    standardize_country_names(&mut df, COL::COUNTRY)?;
    PanelSeries::from_dataframe(&df, metric)
}

fn static_series(df: &DataFrame, metric: &str) -> HealthTrendsResult<StaticSeries> {
    let mut df = df.clone();
    standardize_country_names(&mut df, COL::COUNTRY)?;
    StaticSeries::from_dataframe(&df, metric)
}
