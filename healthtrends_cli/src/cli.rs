use clap::{Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use healthtrends::{
    config::Config,
    fetch::Source,
    formatters::{CsvFormatter, JsonFormatter, OutputFormatter, OutputGenerator},
    HealthTrends,
};
use log::info;
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum::IntoEnumIterator;
use strum_macros::EnumString;

use crate::display::{
    display_gym_obesity, display_refresh, display_sugar_diabetes, display_trends,
};
use crate::error::HealthTrendsCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";

/// Defines how analysis reports are printed.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq, Default)]
#[strum(ascii_case_insensitive)]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

/// Defines the formats a data table can be printed in.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum TableFormat {
    Csv,
    Json,
}

impl From<TableFormat> for OutputFormatter {
    fn from(value: TableFormat) -> Self {
        match value {
            TableFormat::Csv => OutputFormatter::Csv(CsvFormatter),
            TableFormat::Json => OutputFormatter::Json(JsonFormatter),
        }
    }
}

/// Runs `f` with a spinner showing `message`, unless `quiet`
async fn with_spinner<T, F>(quiet: bool, message: &str, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let sp = (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            message.to_string() + RUNNING_TAIL_STRING,
        )
    });
    let result = f.await;
    if let Some(mut s) = sp {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
    }
    result
}

fn print_report<T: Serialize>(
    format: ReportFormat,
    report: &T,
    display: impl Fn(&T) -> anyhow::Result<()>,
) -> HealthTrendsCliResult<()> {
    match format {
        ReportFormat::Table => display(report)?,
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> HealthTrendsCliResult<()>;
}

/// Options shared by the analysis subcommands.
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    #[arg(
        long,
        help = "Analyse the data already in the data directory instead of fetching it again"
    )]
    skip_fetch: bool,
    #[arg(
        short = 'f',
        long,
        value_name = "table|json",
        default_value = "table",
        help = "Output format for the report"
    )]
    output_format: ReportFormat,
    #[arg(from_global)]
    quiet: bool,
}

/// The `fetch` command downloads and cleans source data without analysing it.
#[derive(Args, Debug)]
pub struct FetchCommand {
    #[arg(
        value_name = "SOURCE",
        help = "Sources to fetch (trends, sugar, diabetes, obesity, gym); all when omitted"
    )]
    sources: Vec<Source>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for FetchCommand {
    async fn run(&self, config: Config) -> HealthTrendsCliResult<()> {
        info!("Running `fetch` subcommand");
        let sources: Vec<Source> = if self.sources.is_empty() {
            Source::iter().collect()
        } else {
            self.sources.clone()
        };
        let healthtrends = HealthTrends::new_with_config(config);
        let counts = with_spinner(
            self.quiet,
            "Fetching source data",
            healthtrends.refresh(&sources),
        )
        .await?;
        display_refresh(&counts, &healthtrends.config)?;
        Ok(())
    }
}

/// The `show` command prints a cleaned source table from the data directory.
#[derive(Args, Debug)]
pub struct ShowCommand {
    #[arg(value_name = "SOURCE", help = "Source table to print")]
    source: Source,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        default_value = "csv",
        help = "Output format for the table"
    )]
    output_format: TableFormat,
}

impl RunCommand for ShowCommand {
    async fn run(&self, config: Config) -> HealthTrendsCliResult<()> {
        info!("Running `show` subcommand");
        let mut data = self.source.load(&config)?;
        let formatter: OutputFormatter = self.output_format.into();
        let mut stdout_lock = std::io::stdout().lock();
        formatter.save(&mut stdout_lock, &mut data)?;
        Ok(())
    }
}

/// The `trends` command compares search interest before and after the pandemic.
#[derive(Args, Debug)]
pub struct TrendsCommand {
    #[command(flatten)]
    args: AnalysisArgs,
}

impl RunCommand for TrendsCommand {
    async fn run(&self, config: Config) -> HealthTrendsCliResult<()> {
        info!("Running `trends` subcommand");
        let healthtrends = HealthTrends::new_with_config(config);
        let report = with_spinner(
            self.args.quiet,
            "Analysing search trends",
            healthtrends.run_trends(!self.args.skip_fetch),
        )
        .await?;
        print_report(self.args.output_format, &report, display_trends)
    }
}

/// The `sugar-diabetes` command relates sugar consumption to diabetes prevalence.
#[derive(Args, Debug)]
pub struct SugarDiabetesCommand {
    #[command(flatten)]
    args: AnalysisArgs,
}

impl RunCommand for SugarDiabetesCommand {
    async fn run(&self, config: Config) -> HealthTrendsCliResult<()> {
        info!("Running `sugar-diabetes` subcommand");
        let healthtrends = HealthTrends::new_with_config(config);
        let report = with_spinner(
            self.args.quiet,
            "Analysing sugar consumption and diabetes",
            healthtrends.run_sugar_diabetes(!self.args.skip_fetch),
        )
        .await?;
        print_report(self.args.output_format, &report, display_sugar_diabetes)
    }
}

/// The `gym-obesity` command compares obesity between high and low gym penetration countries.
#[derive(Args, Debug)]
pub struct GymObesityCommand {
    #[command(flatten)]
    args: AnalysisArgs,
}

impl RunCommand for GymObesityCommand {
    async fn run(&self, config: Config) -> HealthTrendsCliResult<()> {
        info!("Running `gym-obesity` subcommand");
        let healthtrends = HealthTrends::new_with_config(config);
        let report = with_spinner(
            self.args.quiet,
            "Analysing gym penetration and obesity",
            healthtrends.run_gym_obesity(!self.args.skip_fetch),
        )
        .await?;
        print_report(self.args.output_format, &report, display_gym_obesity)
    }
}

/// The `all` command runs the three analyses one after the other.
#[derive(Args, Debug)]
pub struct AllCommand {
    #[command(flatten)]
    args: AnalysisArgs,
}

impl RunCommand for AllCommand {
    async fn run(&self, config: Config) -> HealthTrendsCliResult<()> {
        info!("Running `all` subcommand");
        TrendsCommand {
            args: self.args.clone(),
        }
        .run(config.clone())
        .await?;
        SugarDiabetesCommand {
            args: self.args.clone(),
        }
        .run(config.clone())
        .await?;
        GymObesityCommand {
            args: self.args.clone(),
        }
        .run(config)
        .await
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Healthtrends relates public health data to lifestyle data across countries", long_about = None, name="healthtrends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress spinners to stdout. Reports and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Fetch and clean source data into the data directory
    Fetch(FetchCommand),
    /// Print a cleaned source table
    Show(ShowCommand),
    /// Search interest in home workouts and gym memberships around the pandemic
    Trends(TrendsCommand),
    /// Sugar consumption against diabetes prevalence
    SugarDiabetes(SugarDiabetesCommand),
    /// Gym penetration against obesity prevalence
    GymObesity(GymObesityCommand),
    /// Run the three analyses in turn
    All(AllCommand),
}
