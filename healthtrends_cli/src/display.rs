use comfy_table::{presets::NOTHING, *};
use itertools::Itertools;

use healthtrends::{
    analysis::{GymObesityReport, SugarDiabetesReport, TrendsReport},
    config::Config,
    fetch::Source,
    stats::{Correlation, GroupMean, TTest},
    table::TableReport,
};

const UNAVAILABLE: &str = "statistics unavailable";

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn format_rows(report: &TableReport) -> String {
    format!(
        "{} kept of {} ({} unparseable, {} without a value, {} duplicate)",
        report.kept(),
        report.rows_read,
        report.excluded,
        report.missing_values,
        report.duplicates
    )
}

fn format_correlation(correlation: Option<&Correlation>) -> String {
    match correlation {
        Some(c) => format!("r = {:.3}, p = {:.4} (n = {})", c.r, c.p_value, c.n),
        None => UNAVAILABLE.to_string(),
    }
}

fn format_t_test(t_test: Option<&TTest>) -> String {
    match t_test {
        Some(t) => format!(
            "t = {:.3}, p = {:.4} (df = {:.1})",
            t.t_statistic, t.p_value, t.df
        ),
        None => UNAVAILABLE.to_string(),
    }
}

fn group_table(value_header: &str, groups: &[GroupMean]) -> Table {
    let mut table = new_table();
    table.set_header(vec![bold("Group"), bold("Count"), bold(value_header)]);
    for group in groups {
        table.add_row(vec![
            group.label.clone(),
            group.n.to_string(),
            format_value(group.mean),
        ]);
    }
    table
}

pub fn display_refresh(counts: &[(Source, usize)], config: &Config) -> anyhow::Result<()> {
    let mut table = new_table();
    table.set_header(vec![bold("Source"), bold("Rows"), bold("File")]);
    for (source, rows) in counts {
        table.add_row(vec![
            source.to_string(),
            rows.to_string(),
            config.data_file(source.file_name()).display().to_string(),
        ]);
    }
    println!("\n{}", table);
    Ok(())
}

pub fn display_trends(report: &TrendsReport) -> anyhow::Result<()> {
    let mut summary = new_table();
    summary
        .add_row(vec![bold("Rows"), report.rows.to_string().into()])
        .add_row(vec![bold("Keywords"), report.keywords.iter().join(", ").into()]);
    if !report.missing_columns.is_empty() {
        summary.add_row(vec![
            bold("Missing columns"),
            report.missing_columns.iter().join(", ").into(),
        ]);
    }
    summary.add_row(vec![
        bold("Correlation"),
        format_correlation(report.correlation.as_ref()).into(),
    ]);
    println!("\n{}", summary);

    if report.periods.is_empty() {
        return Ok(());
    }
    let mut periods = new_table();
    let mut header = vec![bold("Period"), bold("Weeks")];
    header.extend(report.keywords.iter().map(|keyword| bold(keyword)));
    periods.set_header(header);
    for period in &report.periods {
        let mut row = vec![period.period.clone(), period.rows.to_string()];
        row.extend(period.keyword_means.iter().map(|k| format_value(k.mean)));
        periods.add_row(row);
    }
    println!("\n{}", periods);
    Ok(())
}

pub fn display_sugar_diabetes(report: &SugarDiabetesReport) -> anyhow::Result<()> {
    let mut summary = new_table();
    summary
        .add_row(vec![bold("Sugar rows"), format_rows(&report.sugar_rows).into()])
        .add_row(vec![
            bold("Diabetes rows"),
            format_rows(&report.diabetes_rows).into(),
        ])
        .add_row(vec![
            bold("Merged panel"),
            format!(
                "{} rows across {} countries",
                report.merged_rows, report.countries
            )
            .into(),
        ])
        .add_row(vec![
            bold("Sugar cut points"),
            report
                .sugar_cut_points
                .iter()
                .map(|cut| format!("{cut:.2}"))
                .join(", ")
                .into(),
        ])
        .add_row(vec![
            bold("Correlation"),
            format_correlation(report.correlation.as_ref()).into(),
        ]);
    println!("\n{}", summary);

    if !report.diabetes_by_group.is_empty() {
        println!(
            "\n{}",
            group_table("Mean diabetes prevalence (%)", &report.diabetes_by_group)
        );
    }

    if !report.top_sugar.is_empty() {
        let mut top = new_table();
        top.set_header(vec![
            bold("Country"),
            bold("Mean sugar consumption (kg)"),
        ]);
        for country in &report.top_sugar {
            top.add_row(vec![country.country.clone(), format!("{:.2}", country.mean)]);
        }
        println!("\n{}", top);
    }
    Ok(())
}

pub fn display_gym_obesity(report: &GymObesityReport) -> anyhow::Result<()> {
    let mut summary = new_table();
    summary
        .add_row(vec![bold("Gym rows"), format_rows(&report.gym_rows).into()])
        .add_row(vec![
            bold("Obesity rows"),
            format_rows(&report.obesity_rows).into(),
        ])
        .add_row(vec![
            bold("Merged countries"),
            report.merged_rows.to_string().into(),
        ])
        .add_row(vec![
            bold("Median gym penetration (%)"),
            format_value(report.median_gym_penetration).into(),
        ])
        .add_row(vec![
            bold("Welch's t-test"),
            format_t_test(report.t_test.as_ref()).into(),
        ])
        .add_row(vec![
            bold("Correlation"),
            format_correlation(report.correlation.as_ref()).into(),
        ]);
    println!("\n{}", summary);

    if !report.obesity_by_group.is_empty() {
        println!(
            "\n{}",
            group_table("Mean obesity prevalence (%)", &report.obesity_by_group)
        );
    }

    match report.significant {
        Some(true) => println!(
            "\nStatistically significant difference in obesity prevalence (p < {})",
            report.significance_level
        ),
        Some(false) => println!(
            "\nNo statistically significant difference found (p >= {})",
            report.significance_level
        ),
        None => println!("\nSignificance test: {UNAVAILABLE}"),
    }
    Ok(())
}
