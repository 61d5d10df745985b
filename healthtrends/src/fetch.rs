//! Fetching, cleaning and caching of the five source tables.
//!
//! Each source is written to its own CSV under the data directory. A source that cannot be
//! fetched is replaced by an empty table with the expected headers so that the analyses can
//! still run, reporting the missing data instead of failing.

use std::collections::HashSet;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, info, warn};
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::config::{clean_column_name, paths, Config};
use crate::error::{HealthTrendsError, HealthTrendsResult};
use crate::formatters::write_table;
use crate::html::first_table;
use crate::table::{column, empty_table};
use crate::COL;

/// Gym membership as a share of the population, compiled by hand from industry reports.
pub const GYM_PENETRATION_TABLE: &[(&str, f64)] = &[
    ("United States", 23.7),
    ("United Kingdom", 15.9),
    ("Switzerland", 14.9),
    ("New Zealand", 13.6),
    ("Germany", 13.4),
    ("Sweden", 22.0),
    ("Norway", 22.0),
    ("Netherlands", 18.0),
    ("Denmark", 18.0),
    ("Canada", 16.7),
    ("Australia", 15.3),
    ("Spain", 11.5),
    ("Italy", 9.5),
    ("France", 9.2),
    ("Brazil", 4.6),
    ("Japan", 4.0),
    ("China", 3.0),
    ("India", 0.6),
    ("Mexico", 3.2),
    ("United Arab Emirates", 5.8),
];

/// Header names that start the data section of a Google Trends export
const TRENDS_TIME_HEADERS: &[&str] = &["Week", "Month", "Day"];

/// World Bank region name given to aggregates such as "World" or "Euro area"
const WORLD_BANK_AGGREGATES: &str = "Aggregates";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Source {
    Trends,
    Sugar,
    Diabetes,
    Obesity,
    Gym,
}

impl Source {
    /// Name of the cleaned file under the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Source::Trends => paths::TRENDS,
            Source::Sugar => paths::SUGAR,
            Source::Diabetes => paths::DIABETES,
            Source::Obesity => paths::OBESITY,
            Source::Gym => paths::GYM,
        }
    }

    /// Headers of the cleaned table
    pub fn columns(&self, config: &Config) -> Vec<String> {
        match self {
            Source::Trends => std::iter::once(COL::DATE.to_string())
                .chain(config.keyword_columns())
                .collect(),
            Source::Sugar => vec![
                COL::COUNTRY.into(),
                COL::YEAR.into(),
                COL::SUGAR_CONSUMPTION.into(),
            ],
            Source::Diabetes => vec![
                COL::COUNTRY.into(),
                COL::YEAR.into(),
                COL::DIABETES_PREVALENCE.into(),
            ],
            Source::Obesity => vec![COL::COUNTRY.into(), COL::OBESITY_PREVALENCE.into()],
            Source::Gym => vec![COL::COUNTRY.into(), COL::GYM_PENETRATION.into()],
        }
    }

    /// An empty table with the expected headers
    pub fn placeholder(&self, config: &Config) -> HealthTrendsResult<DataFrame> {
        let columns = self.columns(config);
        let schema: Vec<(&str, DataType)> = columns
            .iter()
            .map(|name| (name.as_str(), DataType::String))
            .collect();
        Ok(empty_table(&schema)?)
    }

    /// Fetch and clean this source, without writing anything.
    pub async fn fetch(&self, config: &Config) -> HealthTrendsResult<DataFrame> {
        match self {
            Source::Trends => {
                let export = std::fs::read_to_string(config.trends_export_path())?;
                parse_trends_export(&export, config)
            }
            Source::Sugar => {
                let raw = read_table(&config.faostat_path())?;
                clean_faostat(&raw)
            }
            Source::Diabetes => fetch_diabetes(config).await,
            Source::Obesity => fetch_obesity(config).await,
            Source::Gym => gym_table(),
        }
    }

    /// Fetch this source and write it to its file, or write the placeholder when fetching fails.
    ///
    /// Returns the number of rows written. Only failing to write is an error.
    pub async fn refresh(&self, config: &Config) -> HealthTrendsResult<usize> {
        info!("Fetching {self} data");
        let mut df = match self.fetch(config).await {
            Ok(df) => df,
            Err(err) => {
                warn!("Could not fetch {self} data, writing an empty table instead: {err}");
                self.placeholder(config)?
            }
        };
        let path = config.data_file(self.file_name());
        write_table(&mut df, &path)?;
        info!("Saved {} {self} records to {}", df.height(), path.display());
        Ok(df.height())
    }

    /// The cleaned table, or the placeholder if it cannot be read.
    pub fn load(&self, config: &Config) -> HealthTrendsResult<DataFrame> {
        let path = config.data_file(self.file_name());
        match read_table(&path) {
            Ok(df) => Ok(df),
            Err(err) => {
                warn!(
                    "Could not read {self} data from {}, using an empty table: {err}",
                    path.display()
                );
                self.placeholder(config)
            }
        }
    }
}

/// Reads a CSV file with a header row, every column as a string.
///
/// Columns are cast to their numeric types by whoever consumes them, so that one bad cell only
/// costs its own row.
pub fn read_table(path: &Path) -> HealthTrendsResult<DataFrame> {
    let file = File::open(path)?;
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()?)
}

fn read_csv_text(text: &str) -> HealthTrendsResult<DataFrame> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
        .finish()?)
}

/// Parses a Google Trends "interest over time" CSV export.
///
/// The export starts with a few lines of preamble before the header row, and names each keyword
/// column like `home workout: (Worldwide)`. Weeks with very low interest are reported as `<1`,
/// read here as 0. Rows outside the configured timeframe are dropped.
pub fn parse_trends_export(export: &str, config: &Config) -> HealthTrendsResult<DataFrame> {
    let (start, end) = config.trends_range()?;
    let header_line = export
        .lines()
        .position(|line| {
            let first = line.split(',').next().unwrap_or_default().trim();
            TRENDS_TIME_HEADERS.contains(&first)
        })
        .ok_or_else(|| {
            HealthTrendsError::Parse("No Week/Month/Day header in trends export".into())
        })?;
    let body = export.lines().skip(header_line).collect::<Vec<_>>().join("\n");
    let raw = read_csv_text(&body)?;

    let mut columns = raw.get_columns().iter();
    let dates = columns
        .next()
        .ok_or_else(|| HealthTrendsError::Parse("Empty trends export".into()))?;
    let in_range: BooleanChunked = dates
        .str()?
        .into_iter()
        .map(|date| {
            date.and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
                .is_some_and(|d| start <= d && d <= end)
        })
        .collect();

    let mut keyword_series = vec![];
    for series in columns {
        let name = series.name().split(':').next().unwrap_or_default();
        if name.trim().eq_ignore_ascii_case(COL::TRENDS_IS_PARTIAL) {
            continue;
        }
        let name = clean_column_name(name);
        if !config.keyword_columns().contains(&name) {
            debug!("Ignoring trends column '{}'", series.name());
            continue;
        }
        let interest: Vec<Option<f64>> = series
            .str()?
            .into_iter()
            .map(|value| value.and_then(parse_interest))
            .collect();
        keyword_series.push(Series::new(&name, interest));
    }
    for keyword in config.keyword_columns() {
        if !keyword_series.iter().any(|s| s.name() == keyword) {
            warn!("Keyword '{keyword}' not found in trends export");
        }
    }

    let mut output = vec![dates.clone().with_name(COL::DATE)];
    output.extend(keyword_series);
    Ok(DataFrame::new(output)?.filter(&in_range)?)
}

fn parse_interest(value: &str) -> Option<f64> {
    match value.trim() {
        "<1" => Some(0.0),
        value => value.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Keeps the area, year and value of a FAOSTAT food balance export.
///
/// Years are truncated to whole numbers; rows with a missing or non-positive year are dropped.
pub fn clean_faostat(raw: &DataFrame) -> HealthTrendsResult<DataFrame> {
    let areas = column(raw, COL::FAOSTAT_AREA)?.cast(&DataType::String)?;
    let years = column(raw, COL::FAOSTAT_YEAR)?.cast(&DataType::Float64)?;
    let values = column(raw, COL::FAOSTAT_VALUE)?.cast(&DataType::Float64)?;

    let mut countries = vec![];
    let mut kept_years = vec![];
    let mut consumption = vec![];
    for ((area, year), value) in areas.str()?.into_iter().zip(years.f64()?).zip(values.f64()?) {
        let Some(year) = year.map(f64::trunc).filter(|y| *y > 0.0) else {
            continue;
        };
        countries.push(area);
        kept_years.push(year as i64);
        consumption.push(value);
    }
    let dropped = raw.height() - countries.len();
    if dropped > 0 {
        debug!("Dropped {dropped} FAOSTAT rows without a valid year");
    }

    Ok(DataFrame::new(vec![
        Series::new(COL::COUNTRY, countries),
        Series::new(COL::YEAR, kept_years),
        Series::new(COL::SUGAR_CONSUMPTION, consumption),
    ])?)
}

#[derive(Debug, Deserialize)]
struct WorldBankPage {
    page: u32,
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct WorldBankLabel {
    value: String,
}

#[derive(Debug, Deserialize)]
struct WorldBankCountry {
    id: String,
    region: WorldBankLabel,
}

#[derive(Debug, Deserialize)]
struct WorldBankObservation {
    country: WorldBankLabel,
    #[serde(default)]
    countryiso3code: String,
    date: String,
    value: Option<f64>,
}

/// Fetches every page of a World Bank v2 API listing.
///
/// The API reports bad requests with a success status and a `message` body, returned here as
/// `HealthTrendsError::Fetch`.
async fn world_bank_pages<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, String)],
) -> HealthTrendsResult<Vec<T>> {
    let mut items = vec![];
    let mut page = 1;
    loop {
        debug!("Requesting {url} page {page}");
        let body: serde_json::Value = client
            .get(url)
            .query(&[("format", "json".to_string()), ("page", page.to_string())])
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(message) = body.get(0).and_then(|header| header.get("message")) {
            return Err(HealthTrendsError::Fetch(format!(
                "World Bank API error for {url}: {message}"
            )));
        }
        let (info, page_items): (WorldBankPage, Option<Vec<T>>) = serde_json::from_value(body)
            .map_err(|e| HealthTrendsError::Parse(format!("Unexpected World Bank response: {e}")))?;
        items.extend(page_items.unwrap_or_default());
        if info.page >= info.pages {
            return Ok(items);
        }
        page = info.page + 1;
    }
}

/// Three-letter codes of the World Bank's regional and income-group aggregates
async fn world_bank_aggregates(
    client: &reqwest::Client,
    config: &Config,
) -> HealthTrendsResult<HashSet<String>> {
    let url = format!("{}/country", config.world_bank_base_url);
    let countries: Vec<WorldBankCountry> =
        world_bank_pages(client, &url, &[("per_page", "400".to_string())]).await?;
    Ok(countries
        .into_iter()
        .filter(|c| c.region.value.trim() == WORLD_BANK_AGGREGATES)
        .map(|c| c.id)
        .collect())
}

/// Diabetes prevalence per country and year from the World Bank indicators API.
///
/// Aggregates and missing values are skipped; rows are sorted by country then year.
pub async fn fetch_diabetes(config: &Config) -> HealthTrendsResult<DataFrame> {
    let client = reqwest::Client::new();
    let aggregates = world_bank_aggregates(&client, config).await?;
    debug!("Skipping {} World Bank aggregates", aggregates.len());

    let url = format!(
        "{}/country/all/indicator/{}",
        config.world_bank_base_url, config.diabetes_indicator
    );
    let date = format!(
        "{}:{}",
        config.world_bank_start_year, config.world_bank_end_year
    );
    let observations: Vec<WorldBankObservation> = world_bank_pages(
        &client,
        &url,
        &[("date", date), ("per_page", "1000".to_string())],
    )
    .await?;

    let mut rows: Vec<(String, i64, f64)> = observations
        .into_iter()
        .filter(|obs| {
            !obs.countryiso3code.is_empty() && !aggregates.contains(&obs.countryiso3code)
        })
        .filter_map(|obs| {
            let year = obs.date.trim().parse().ok()?;
            Some((obs.country.value, year, obs.value?))
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let (countries, (years, values)): (Vec<String>, (Vec<i64>, Vec<f64>)) = rows
        .into_iter()
        .map(|(country, year, value)| (country, (year, value)))
        .unzip();
    Ok(DataFrame::new(vec![
        Series::new(COL::COUNTRY, countries),
        Series::new(COL::YEAR, years),
        Series::new(COL::DIABETES_PREVALENCE, values),
    ])?)
}

/// Obesity prevalence per country, scraped from the ranking page's first table.
pub async fn fetch_obesity(config: &Config) -> HealthTrendsResult<DataFrame> {
    let page = reqwest::Client::new()
        .get(&config.obesity_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_obesity_page(&page)
}

/// Extracts `Country` and the last obesity or rate column from the first table of `page`.
pub fn parse_obesity_page(page: &str) -> HealthTrendsResult<DataFrame> {
    let table = first_table(page)
        .ok_or_else(|| HealthTrendsError::Parse("No table found on obesity page".into()))?;
    let country_idx = table
        .find_header(|h| h.to_lowercase().contains("country"))
        .ok_or_else(|| HealthTrendsError::Parse("No country column on obesity page".into()))?;
    let value_idx = table
        .rfind_header(|h| h.contains("Obesity") || h.contains("Rate"))
        .ok_or_else(|| HealthTrendsError::Parse("No obesity column on obesity page".into()))?;
    debug!(
        "Reading obesity rates from column '{}'",
        table.headers[value_idx]
    );

    let (countries, values): (Vec<&str>, Vec<f64>) = table
        .column(country_idx)
        .into_iter()
        .zip(table.column(value_idx))
        .filter_map(|(country, value)| {
            let country = country.map(str::trim).filter(|c| !c.is_empty())?;
            let value = value?.replace('%', "").trim().parse::<f64>().ok()?;
            Some((country, value))
        })
        .unzip();

    Ok(DataFrame::new(vec![
        Series::new(COL::COUNTRY, countries),
        Series::new(COL::OBESITY_PREVALENCE, values),
    ])?)
}

pub fn gym_table() -> HealthTrendsResult<DataFrame> {
    let (countries, values): (Vec<&str>, Vec<f64>) = GYM_PENETRATION_TABLE.iter().copied().unzip();
    Ok(DataFrame::new(vec![
        Series::new(COL::COUNTRY, countries),
        Series::new(COL::GYM_PENETRATION, values),
    ])?)
}
