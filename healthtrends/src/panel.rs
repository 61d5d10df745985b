//! Joining two year-indexed series on (canonical country, year).

use std::collections::{BTreeMap, HashMap};

use log::debug;
use polars::prelude::*;
use serde::Serialize;

use crate::table::{PanelObservation, PanelSeries};
use crate::COL;

/// One country-year with both metrics known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedPanelRow {
    /// Display name: the left source's spelling, or the right source's when the left has none
    pub country: String,
    pub canonical_name: String,
    pub year: i32,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedPanel {
    pub left_metric: String,
    pub right_metric: String,
    pub rows: Vec<MergedPanelRow>,
}

/// A left row with the right value attached when one exists for the same country-year.
struct JoinedRow<'a> {
    left: &'a PanelObservation,
    right: Option<&'a PanelObservation>,
    right_value: Option<f64>,
}

/// Left outer join of `left` and `right` on (canonical country, year).
///
/// Missing right values are then gap-filled within each country, ordered by year: first from the
/// nearest earlier year, then, for years before the first known value, from the nearest later
/// year. This treats the right metric as slowly changing within a country; it is an
/// approximation, not an imputation model. Left country-years with an unknown left value still
/// carry their right value into the fill. Country-years where either metric is unknown after
/// filling are dropped.
///
/// Rows are returned sorted by canonical country then year.
pub fn merge_panels(left: &PanelSeries, right: &PanelSeries) -> MergedPanel {
    let right_index: HashMap<(&str, i32), &PanelObservation> = right
        .observations
        .iter()
        .map(|obs| ((obs.country.canonical_name.as_str(), obs.year), obs))
        .collect();

    let mut groups: BTreeMap<&str, Vec<JoinedRow>> = BTreeMap::new();
    for obs in &left.observations {
        let key = (obs.country.canonical_name.as_str(), obs.year);
        let right = right_index.get(&key).copied();
        groups.entry(key.0).or_default().push(JoinedRow {
            left: obs,
            right,
            right_value: right.and_then(|r| r.value),
        });
    }

    let mut rows = Vec::with_capacity(left.len());
    let mut unfilled = 0;
    for (canonical_name, mut group) in groups {
        group.sort_by_key(|row| row.left.year);
        let mut values: Vec<Option<f64>> = group.iter().map(|row| row.right_value).collect();
        fill_gaps(&mut values);

        for (row, value) in group.into_iter().zip(values) {
            let (Some(left_value), Some(right_value)) = (row.left.value, value) else {
                unfilled += 1;
                continue;
            };
            rows.push(MergedPanelRow {
                country: display_name(row.left, row.right),
                canonical_name: canonical_name.to_string(),
                year: row.left.year,
                left: left_value,
                right: right_value,
            });
        }
    }
    debug!(
        "Merged {} with {}: {} rows kept, {unfilled} dropped with a value still unknown",
        left.metric_name,
        right.metric_name,
        rows.len()
    );

    MergedPanel {
        left_metric: left.metric_name.clone(),
        right_metric: right.metric_name.clone(),
        rows,
    }
}

/// Forward fill, then backward fill whatever is still missing at the start.
fn fill_gaps(values: &mut [Option<f64>]) {
    let mut last_seen = None;
    for value in values.iter_mut() {
        match *value {
            Some(v) => last_seen = Some(v),
            None => *value = last_seen,
        }
    }
    let mut next_seen = None;
    for value in values.iter_mut().rev() {
        match *value {
            Some(v) => next_seen = Some(v),
            None => *value = next_seen,
        }
    }
}

fn display_name(left: &PanelObservation, right: Option<&PanelObservation>) -> String {
    if !left.country.raw_name.trim().is_empty() {
        return left.country.raw_name.clone();
    }
    right
        .map(|r| r.country.raw_name.clone())
        .unwrap_or_default()
}

impl MergedPanel {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn left_values(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.left).collect()
    }

    pub fn right_values(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.right).collect()
    }

    /// Table with `Country`, `Year`, both metrics and `std_country`
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let countries: Vec<&str> = self.rows.iter().map(|r| r.country.as_str()).collect();
        let years: Vec<i32> = self.rows.iter().map(|r| r.year).collect();
        let canonical: Vec<&str> = self
            .rows
            .iter()
            .map(|r| r.canonical_name.as_str())
            .collect();
        DataFrame::new(vec![
            Series::new(COL::COUNTRY, countries),
            Series::new(COL::YEAR, years),
            Series::new(&self.left_metric, self.left_values()),
            Series::new(&self.right_metric, self.right_values()),
            Series::new(COL::STD_COUNTRY, canonical),
        ])
    }
}
