//! Canonical country names, used as the join key across all sources.

use std::collections::HashMap;
use std::sync::OnceLock;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::HealthTrendsResult;
use crate::table::column;
use crate::COL;

/// Spellings used by the different publishers, mapped to the short form used as the canonical
/// name. Keys must already be lowercase and trimmed since lookups happen after normalization.
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("united states of america", "united states"),
    ("usa", "united states"),
    (
        "united kingdom of great britain and northern ireland",
        "united kingdom",
    ),
    ("uk", "united kingdom"),
    ("russian federation", "russia"),
    ("korea, rep.", "south korea"),
    ("republic of korea", "south korea"),
    ("iran (islamic republic of)", "iran"),
    ("iran, islamic rep.", "iran"),
    ("venezuela (bolivarian republic of)", "venezuela"),
    ("venezuela, rb", "venezuela"),
    ("bolivia (plurinational state of)", "bolivia"),
    ("egypt, arab rep.", "egypt"),
    ("turkiye", "turkey"),
];

fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    static ALIASES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    ALIASES.get_or_init(|| COUNTRY_ALIASES.iter().copied().collect())
}

/// Lowercase and trim `raw`, then resolve known aliases. Unknown names are their own canonical
/// form.
pub fn canonical_country_name(raw: &str) -> String {
    let name = raw.to_lowercase().trim().to_string();
    match alias_table().get(name.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => name,
    }
}

/// A country as spelled by one source, along with the key it joins on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryRecord {
    pub raw_name: String,
    pub canonical_name: String,
}

impl CountryRecord {
    pub fn new(raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        let canonical_name = canonical_country_name(&raw_name);
        Self {
            raw_name,
            canonical_name,
        }
    }

    /// Two records denote the same country whatever their spelling
    pub fn same_country(&self, other: &CountryRecord) -> bool {
        self.canonical_name == other.canonical_name
    }
}

impl From<&str> for CountryRecord {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Adds a `std_country` column holding the canonical form of `country_col`.
///
/// A string column is normalized row by row and nulls stay null. A column of any other type is
/// copied through unchanged: there is nothing to normalize, and it is left to the caller to
/// decide what to do with such rows.
pub fn standardize_country_names(
    df: &mut DataFrame,
    country_col: &str,
) -> HealthTrendsResult<()> {
    let countries = column(df, country_col)?;
    let standardized = match countries.dtype() {
        DataType::String => {
            let names: Vec<Option<String>> = countries
                .str()?
                .into_iter()
                .map(|name| name.map(canonical_country_name))
                .collect();
            Series::new(COL::STD_COUNTRY, names)
        }
        _ => countries.clone().with_name(COL::STD_COUNTRY),
    };
    df.with_column(standardized)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn aliases_should_resolve_to_canonical_names() {
        for (alias, canonical) in COUNTRY_ALIASES {
            assert_eq!(canonical_country_name(alias), *canonical, "alias: {alias}");
        }
        assert_eq!(canonical_country_name("  USA "), "united states");
        assert_eq!(
            canonical_country_name("United Kingdom of Great Britain and Northern Ireland"),
            "united kingdom"
        );
        assert_eq!(canonical_country_name("Türkiye"), "türkiye");
        assert_eq!(canonical_country_name("Turkiye"), "turkey");
    }

    #[test]
    fn unknown_names_should_be_lowercased_and_trimmed() {
        assert_eq!(canonical_country_name(" New Zealand\t"), "new zealand");
        assert_eq!(canonical_country_name("germany"), "germany");
        assert_eq!(canonical_country_name(""), "");
    }

    #[test]
    fn alias_keys_should_already_be_normalized() {
        for (alias, canonical) in COUNTRY_ALIASES {
            assert_eq!(*alias, alias.trim().to_lowercase());
            assert_eq!(*canonical, canonical.trim().to_lowercase());
        }
    }

    #[test]
    fn records_should_compare_by_canonical_name() {
        let a = CountryRecord::new("Russian Federation");
        let b: CountryRecord = "russia".into();
        assert!(a.same_country(&b));
        assert_ne!(a, b, "raw spellings are kept");
        assert_eq!(a.raw_name, "Russian Federation");
    }

    #[test]
    fn standardize_should_add_column_and_keep_nulls() -> anyhow::Result<()> {
        let mut df = df!(COL::COUNTRY => &[Some("UK"), None, Some(" Brazil ")])?;
        standardize_country_names(&mut df, COL::COUNTRY)?;
        let std_names: Vec<Option<&str>> = df.column(COL::STD_COUNTRY)?.str()?.into_iter().collect();
        assert_eq!(
            std_names,
            vec![Some("united kingdom"), None, Some("brazil")]
        );
        // Raw names are untouched
        let raw: Vec<Option<&str>> = df.column(COL::COUNTRY)?.str()?.into_iter().collect();
        assert_eq!(raw, vec![Some("UK"), None, Some(" Brazil ")]);
        Ok(())
    }

    #[test]
    fn standardize_should_pass_non_string_columns_through() -> anyhow::Result<()> {
        let mut df = df!(COL::COUNTRY => &[840i64, 276])?;
        standardize_country_names(&mut df, COL::COUNTRY)?;
        let std_codes: Vec<Option<i64>> = df.column(COL::STD_COUNTRY)?.i64()?.into_iter().collect();
        assert_eq!(std_codes, vec![Some(840), Some(276)]);
        Ok(())
    }
}
