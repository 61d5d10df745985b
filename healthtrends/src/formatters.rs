use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use enum_dispatch::enum_dispatch;
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Utility function to convert from polars `AnyValue` to `serde_json::Value`
/// Doesn't cover all types but the ones our tables hold.
fn any_value_to_json(value: &AnyValue) -> Result<Value> {
    match value {
        AnyValue::Null => Ok(Value::Null),
        AnyValue::Boolean(b) => Ok(Value::Bool(*b)),
        AnyValue::String(s) => Ok(Value::String((*s).to_string())),
        AnyValue::StringOwned(s) => Ok(Value::String(s.to_string())),
        AnyValue::Int8(n) => Ok(json!(*n)),
        AnyValue::Int16(n) => Ok(json!(*n)),
        AnyValue::Int32(n) => Ok(json!(*n)),
        AnyValue::Int64(n) => Ok(json!(*n)),
        AnyValue::UInt8(n) => Ok(json!(*n)),
        AnyValue::UInt16(n) => Ok(json!(*n)),
        AnyValue::UInt32(n) => Ok(json!(*n)),
        AnyValue::UInt64(n) => Ok(json!(*n)),
        // NaN and infinities have no JSON representation and become null
        AnyValue::Float32(n) => Ok(json!(*n)),
        AnyValue::Float64(n) => Ok(json!(*n)),
        _ => Err(anyhow!("Failed to convert type: {}", value.dtype())),
    }
}

/// Trait to define different output generators. Defines two
/// functions, format which generates a serialized string of the
/// `DataFrame` and save which writes it to a writer
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;

        Ok(String::from_utf8(data)?)
    }
}

/// Enum of OutputFormatters one for each potential
/// output type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatter {
    Csv(CsvFormatter),
    Json(JsonFormatter),
}

/// Format the table as CSV with a header row
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormatter;

impl OutputGenerator for CsvFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        CsvWriter::new(writer).finish(df)?;
        Ok(())
    }
}

/// Format the table as a JSON array with one object per row
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JsonFormatter;

impl JsonFormatter {
    fn records(&self, df: &DataFrame) -> Result<Vec<Value>> {
        (0..df.height())
            .map(|idx| -> Result<Value> {
                let mut record = Map::new();
                for col in df.get_columns() {
                    record.insert(col.name().to_string(), any_value_to_json(&col.get(idx)?)?);
                }
                Ok(Value::Object(record))
            })
            .collect()
    }
}

impl OutputGenerator for JsonFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        serde_json::to_writer(&mut *writer, &self.records(df)?)?;
        writeln!(writer)?;
        Ok(())
    }
}

/// Writes `df` as CSV to `path`, creating the parent directory when needed
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    CsvFormatter.save(&mut writer, df)?;
    writer.flush()?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::COL;

    fn test_df() -> DataFrame {
        df!(
            COL::COUNTRY => &["Japan", "Chile"],
            COL::YEAR => &[2019i32, 2020],
            COL::SUGAR_CONSUMPTION => &[Some(17.5), None]
        )
        .unwrap()
    }

    #[test]
    fn test_csv_output() {
        let mut df = test_df();
        let output = OutputFormatter::from(CsvFormatter).format(&mut df).unwrap();
        assert_eq!(
            output,
            "Country,Year,Sugar_Consumption_kg\nJapan,2019,17.5\nChile,2020,\n"
        );
    }

    #[test]
    fn test_json_output() {
        let mut df = test_df();
        let output = JsonFormatter.format(&mut df).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            parsed,
            json!([
                {"Country": "Japan", "Year": 2019, "Sugar_Consumption_kg": 17.5},
                {"Country": "Chile", "Year": 2020, "Sugar_Consumption_kg": null},
            ])
        );
    }

    #[test]
    fn write_table_should_create_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figures").join("fig.csv");
        let mut df = test_df();
        write_table(&mut df, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Country,Year,Sugar_Consumption_kg\n"));
        assert_eq!(written.lines().count(), 3);
    }
}
