//! Joining two single-value-per-country series on canonical country.

use std::collections::HashMap;

use log::debug;
use polars::prelude::*;
use serde::Serialize;

use crate::table::{StaticObservation, StaticSeries};
use crate::COL;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedStaticRow {
    /// Display name, always the left source's spelling
    pub country: String,
    pub canonical_name: String,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedStatic {
    pub left_metric: String,
    pub right_metric: String,
    pub rows: Vec<MergedStaticRow>,
}

/// Inner join of `left` and `right` on canonical country, in the order of `left`.
///
/// Countries present in only one of the sources carry no signal and are dropped, as are rows
/// whose values are not finite. The display name is taken from `left` even when `right` spells
/// the country differently.
pub fn merge_static(left: &StaticSeries, right: &StaticSeries) -> MergedStatic {
    let right_index: HashMap<&str, &StaticObservation> = right
        .observations
        .iter()
        .map(|obs| (obs.country.canonical_name.as_str(), obs))
        .collect();

    let rows: Vec<MergedStaticRow> = left
        .observations
        .iter()
        .filter_map(|obs| {
            let matched = right_index.get(obs.country.canonical_name.as_str())?;
            Some(MergedStaticRow {
                country: obs.country.raw_name.clone(),
                canonical_name: obs.country.canonical_name.clone(),
                left: obs.value,
                right: matched.value,
            })
        })
        .filter(|row| row.left.is_finite() && row.right.is_finite())
        .collect();
    debug!(
        "Merged {} ({} rows) with {} ({} rows): {} in common",
        left.metric_name,
        left.len(),
        right.metric_name,
        right.len(),
        rows.len()
    );

    MergedStatic {
        left_metric: left.metric_name.clone(),
        right_metric: right.metric_name.clone(),
        rows,
    }
}

impl MergedStatic {
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

    /// Table with `Country`, both metrics and `std_country`
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let countries: Vec<&str> = self.rows.iter().map(|r| r.country.as_str()).collect();
        let canonical: Vec<&str> = self
            .rows
            .iter()
            .map(|r| r.canonical_name.as_str())
            .collect();
        DataFrame::new(vec![
            Series::new(COL::COUNTRY, countries),
            Series::new(&self.left_metric, self.left_values()),
            Series::new(&self.right_metric, self.right_values()),
            Series::new(COL::STD_COUNTRY, canonical),
        ])
    }
}
