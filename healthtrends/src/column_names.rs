//! This module stores the column names of the tables exchanged between the fetch layer, the merge
//! engines and the output files. Note that these must be kept in sync with the headers written by
//! the `fetch` module, since the cleaned CSV files are read back by name!

pub const COUNTRY: &str = "Country";
pub const YEAR: &str = "Year";
pub const STD_COUNTRY: &str = "std_country";
pub const DATE: &str = "date";
pub const PERIOD: &str = "period";

pub const SUGAR_CONSUMPTION: &str = "Sugar_Consumption_kg";
pub const SUGAR_GROUP: &str = "Sugar_Group";
pub const AVG_SUGAR_CONSUMPTION: &str = "Avg_Sugar_Consumption_kg";
pub const DIABETES_PREVALENCE: &str = "Diabetes_Prevalence_pct";

pub const GYM_PENETRATION: &str = "Gym_Penetration_pct";
pub const GYM_GROUP: &str = "Gym_Group";
pub const OBESITY_PREVALENCE: &str = "Obesity_Prevalence_pct";

pub const FAOSTAT_AREA: &str = "Area";
pub const FAOSTAT_YEAR: &str = "Year";
pub const FAOSTAT_VALUE: &str = "Value";

pub const TRENDS_IS_PARTIAL: &str = "isPartial";
