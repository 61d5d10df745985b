//! Naive extraction of plain-text tables from an HTML page.
//!
//! Only handles well-formed, unnested `<table>`/`<tr>`/`<th>`/`<td>` markup, which is all the
//! obesity ranking page uses.

use std::sync::LazyLock;

use regex::Regex;

static TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("Invalid table regex")
});
static ROW_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("Invalid row regex"));
static CELL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(th|td)\b[^>]*>(.*?)</(?:th|td)>").expect("Invalid cell regex")
});
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// Index of the first header for which `pred` holds
    pub fn find_header(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.headers.iter().position(|h| pred(h))
    }

    /// Index of the last header for which `pred` holds
    pub fn rfind_header(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.headers.iter().rposition(|h| pred(h))
    }

    /// Cell `index` of every row, `None` where a row is too short
    pub fn column(&self, index: usize) -> Vec<Option<&str>> {
        self.rows
            .iter()
            .map(|row| row.get(index).map(String::as_str))
            .collect()
    }
}

/// The first `<table>` of `html`.
///
/// The header is the first row made of `<th>` cells, or the first row when there is none; every
/// row with `<td>` cells after it is data.
pub fn first_table(html: &str) -> Option<HtmlTable> {
    let inner = TABLE_REGEX.captures(html)?.get(1)?.as_str();
    let rows: Vec<(bool, Vec<String>)> = ROW_REGEX
        .captures_iter(inner)
        .filter_map(|row| row.get(1))
        .map(|row| {
            let mut is_header = false;
            let cells: Vec<String> = CELL_REGEX
                .captures_iter(row.as_str())
                .map(|cell| {
                    is_header |= cell[1].eq_ignore_ascii_case("th");
                    cell_text(&cell[2])
                })
                .collect();
            (is_header, cells)
        })
        .filter(|(_, cells)| !cells.is_empty())
        .collect();

    let header_index = rows.iter().position(|(is_header, _)| *is_header).unwrap_or(0);
    let mut rows = rows.into_iter().skip(header_index);
    let (_, headers) = rows.next()?;
    Some(HtmlTable {
        headers,
        rows: rows
            .filter(|(is_header, _)| !is_header)
            .map(|(_, cells)| cells)
            .collect(),
    })
}

/// Text content of a cell: tags removed, common entities decoded, whitespace collapsed.
fn cell_text(cell: &str) -> String {
    let text = TAG_REGEX.replace_all(cell, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&#37;", "%")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
