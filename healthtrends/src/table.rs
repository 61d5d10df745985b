//! Typed views over the `Country`/`Year`/metric tables handed over by the fetch layer.
//!
//! Rows that cannot be keyed (missing or non-string country, unparseable or non-positive year) are
//! excluded rather than coerced, and counted in a `TableReport`. A static row is also excluded when
//! its metric value cannot be parsed; a panel row keeps its key with an unknown value so that it
//! still takes part in the join and gap-fill.

use std::collections::HashSet;

use itertools::izip;
use log::debug;
use polars::prelude::*;
use serde::Serialize;

use crate::country::{canonical_country_name, CountryRecord};
use crate::error::{HealthTrendsError, HealthTrendsResult};
use crate::COL;

/// Look up a column, reporting its absence as a schema error
pub fn column<'a>(df: &'a DataFrame, name: &str) -> HealthTrendsResult<&'a Series> {
    df.column(name)
        .map_err(|_| HealthTrendsError::MissingColumn(name.to_string()))
}

/// Builds a table with no rows and the given headers
pub fn empty_table(columns: &[(&str, DataType)]) -> PolarsResult<DataFrame> {
    DataFrame::new(
        columns
            .iter()
            .map(|(name, dtype)| Series::new_empty(name, dtype))
            .collect(),
    )
}

/// Counts of what happened to the rows of a source table on the way into a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub rows_read: usize,
    /// Rows dropped because a value could not be parsed
    pub excluded: usize,
    /// Panel rows kept with an unknown metric value
    pub missing_values: usize,
    /// Rows dropped because their key was already present
    pub duplicates: usize,
}

impl TableReport {
    pub fn kept(&self) -> usize {
        self.rows_read - self.excluded - self.duplicates
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelObservation {
    pub country: CountryRecord,
    pub year: i32,
    /// `None` when the source has the country-year but no usable value
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticObservation {
    pub country: CountryRecord,
    pub value: f64,
}

/// A year-indexed metric with at most one value per (canonical country, year).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSeries {
    pub metric_name: String,
    pub observations: Vec<PanelObservation>,
    pub report: TableReport,
}

/// A metric with a single value per canonical country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticSeries {
    pub metric_name: String,
    pub observations: Vec<StaticObservation>,
    pub report: TableReport,
}

impl PanelSeries {
    /// Builds a series keeping the first observation seen for each (canonical country, year).
    pub fn new(
        metric_name: impl Into<String>,
        observations: impl IntoIterator<Item = PanelObservation>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut report = TableReport::default();
        let mut kept = vec![];
        for observation in observations {
            report.rows_read += 1;
            if seen.insert((observation.country.canonical_name.clone(), observation.year)) {
                if observation.value.is_none() {
                    report.missing_values += 1;
                }
                kept.push(observation);
            } else {
                report.duplicates += 1;
            }
        }
        Self {
            metric_name: metric_name.into(),
            observations: kept,
            report,
        }
    }

    /// Reads the `Country`, `Year` and `metric_col` columns of `df`. Rows with a usable key but
    /// an unparseable value are kept with `value: None`.
    pub fn from_dataframe(df: &DataFrame, metric_col: &str) -> HealthTrendsResult<Self> {
        let countries = country_records(df)?;
        let years = numeric_cells(df, COL::YEAR)?;
        let values = numeric_cells(df, metric_col)?;

        let mut excluded = 0;
        let mut observations = Vec::with_capacity(df.height());
        for (country, year, value) in izip!(countries, years, values) {
            match (country, year.and_then(parse_year)) {
                (Some(country), Some(year)) => observations.push(PanelObservation {
                    country,
                    year,
                    value,
                }),
                _ => excluded += 1,
            }
        }

        let mut series = Self::new(metric_col, observations);
        series.report.rows_read += excluded;
        series.report.excluded = excluded;
        debug!("{metric_col}: {:?}", series.report);
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl StaticSeries {
    /// Builds a series keeping the first observation seen for each canonical country.
    pub fn new(
        metric_name: impl Into<String>,
        observations: impl IntoIterator<Item = StaticObservation>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut report = TableReport::default();
        let mut kept = vec![];
        for observation in observations {
            report.rows_read += 1;
            if seen.insert(observation.country.canonical_name.clone()) {
                kept.push(observation);
            } else {
                report.duplicates += 1;
            }
        }
        Self {
            metric_name: metric_name.into(),
            observations: kept,
            report,
        }
    }

    /// Reads the `Country` and `metric_col` columns of `df`.
    pub fn from_dataframe(df: &DataFrame, metric_col: &str) -> HealthTrendsResult<Self> {
        let countries = country_records(df)?;
        let values = numeric_cells(df, metric_col)?;

        let mut excluded = 0;
        let mut observations = Vec::with_capacity(df.height());
        for (country, value) in countries.into_iter().zip(values) {
            match (country, value) {
                (Some(country), Some(value)) => {
                    observations.push(StaticObservation { country, value })
                }
                _ => excluded += 1,
            }
        }

        let mut series = Self::new(metric_col, observations);
        series.report.rows_read += excluded;
        series.report.excluded = excluded;
        debug!("{metric_col}: {:?}", series.report);
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Country of each row, using the `std_country` column when the table has already been
/// standardized. Non-string and blank cells give `None`.
fn country_records(df: &DataFrame) -> HealthTrendsResult<Vec<Option<CountryRecord>>> {
    let countries = column(df, COL::COUNTRY)?;
    if countries.dtype() != &DataType::String {
        return Ok(vec![None; countries.len()]);
    }
    let standardized = df
        .column(COL::STD_COUNTRY)
        .ok()
        .filter(|s| s.dtype() == &DataType::String);

    let raw_names = countries.str()?;
    let records = match standardized {
        Some(std_names) => raw_names
            .into_iter()
            .zip(std_names.str()?)
            .map(|(raw, canonical)| match (raw, canonical) {
                (Some(raw), Some(canonical)) => Some(CountryRecord {
                    raw_name: raw.to_string(),
                    canonical_name: canonical.to_string(),
                }),
                _ => None,
            })
            .collect::<Vec<_>>(),
        None => raw_names
            .into_iter()
            .map(|raw| {
                raw.map(|raw| CountryRecord {
                    raw_name: raw.to_string(),
                    canonical_name: canonical_country_name(raw),
                })
            })
            .collect(),
    };
    Ok(records
        .into_iter()
        .map(|record| record.filter(|r| !r.canonical_name.is_empty()))
        .collect())
}

/// Values of a column as finite floats; anything that does not cast is `None`.
fn numeric_cells(df: &DataFrame, name: &str) -> HealthTrendsResult<Vec<Option<f64>>> {
    let values = column(df, name)?.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect())
}

/// Years are truncated to whole numbers and must be positive.
fn parse_year(value: f64) -> Option<i32> {
    let year = value.trunc();
    (year >= 1.0 && year <= f64::from(i32::MAX)).then_some(year as i32)
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn panel_series_should_exclude_unkeyed_rows() -> anyhow::Result<()> {
        let df = df!(
            COL::COUNTRY => &[Some("France"), Some("France"), None, Some("Spain"), Some("Spain")],
            COL::YEAR => &["2019", "oops", "2019", "0", "2020"],
            COL::SUGAR_CONSUMPTION => &[Some(30.0), Some(31.0), Some(12.0), Some(20.0), None]
        )?;
        let series = PanelSeries::from_dataframe(&df, COL::SUGAR_CONSUMPTION)?;
        assert_eq!(series.len(), 2);
        assert_eq!(series.observations[0].country.canonical_name, "france");
        assert_eq!(series.observations[0].year, 2019);
        assert_eq!(series.observations[0].value, Some(30.0));
        // Spain 2020 keeps its key for the join
        assert_eq!(series.observations[1].country.canonical_name, "spain");
        assert_eq!(series.observations[1].value, None);
        assert_eq!(
            series.report,
            TableReport {
                rows_read: 5,
                excluded: 3,
                missing_values: 1,
                duplicates: 0
            }
        );
        assert_eq!(series.report.kept(), 2);
        Ok(())
    }

    #[test]
    fn panel_series_should_keep_first_duplicate() -> anyhow::Result<()> {
        let df = df!(
            COL::COUNTRY => &["USA", "United States of America", "USA"],
            COL::YEAR => &[2019i64, 2019, 2020],
            COL::DIABETES_PREVALENCE => &[10.0, 11.0, 10.5]
        )?;
        let series = PanelSeries::from_dataframe(&df, COL::DIABETES_PREVALENCE)?;
        assert_eq!(series.len(), 2);
        assert_eq!(series.observations[0].value, Some(10.0));
        assert_eq!(series.report.duplicates, 1);
        Ok(())
    }

    #[test]
    fn static_series_should_read_numeric_strings() -> anyhow::Result<()> {
        let df = df!(
            COL::COUNTRY => &["Germany", "Japan", "  "],
            COL::OBESITY_PREVALENCE => &["19.0", "n/a", "4.3"]
        )?;
        let series = StaticSeries::from_dataframe(&df, COL::OBESITY_PREVALENCE)?;
        assert_eq!(series.len(), 1);
        assert_eq!(series.observations[0].country.raw_name, "Germany");
        assert_eq!(series.report.excluded, 2);
        Ok(())
    }

    #[test]
    fn non_string_country_column_should_exclude_every_row() -> anyhow::Result<()> {
        let df = df!(
            COL::COUNTRY => &[1i64, 2],
            COL::GYM_PENETRATION => &[1.0, 2.0]
        )?;
        let series = StaticSeries::from_dataframe(&df, COL::GYM_PENETRATION)?;
        assert!(series.is_empty());
        assert_eq!(series.report.excluded, 2);
        Ok(())
    }

    #[test]
    fn empty_table_should_give_empty_series() -> anyhow::Result<()> {
        let df = empty_table(&[
            (COL::COUNTRY, DataType::String),
            (COL::YEAR, DataType::String),
            (COL::SUGAR_CONSUMPTION, DataType::String),
        ])?;
        assert_eq!(df.height(), 0);
        let series = PanelSeries::from_dataframe(&df, COL::SUGAR_CONSUMPTION)?;
        assert!(series.is_empty());
        assert_eq!(series.report, TableReport::default());
        Ok(())
    }

    #[test]
    fn missing_metric_column_should_be_a_schema_error() -> anyhow::Result<()> {
        let df = df!(COL::COUNTRY => &["France"], COL::YEAR => &[2019i64])?;
        let result = PanelSeries::from_dataframe(&df, COL::SUGAR_CONSUMPTION);
        assert!(matches!(
            result,
            Err(HealthTrendsError::MissingColumn(name)) if name == COL::SUGAR_CONSUMPTION
        ));
        Ok(())
    }
}
