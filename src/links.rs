use url::Url;

use crate::table::Row;

/// Column whose value decides whether the label becomes a link.
pub const LINK_COLUMN: usize = 1;

/// How a single cell is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellContent<'a> {
    Link {
        text: &'a str,
        url: &'a str,
        tooltip: String,
    },
    /// The raw URL column, present in the table but not shown.
    Suppressed(&'a str),
    Plain(&'a str),
}

/// Decide the presentation of `row[column]`.
///
/// The label (column 0) turns into a link only if column 1 parses as an
/// absolute URL. A value that fails to parse degrades to plain text.
pub fn cell_content(row: &Row, column: usize) -> CellContent<'_> {
    let text = row.get(column).map(String::as_str).unwrap_or("");
    match column {
        0 => match row_link(row) {
            Some((url, tooltip)) => CellContent::Link { text, url, tooltip },
            None => CellContent::Plain(text),
        },
        LINK_COLUMN => CellContent::Suppressed(text),
        _ => CellContent::Plain(text),
    }
}

/// The link target of a row and its tooltip, if column 1 is a valid URL.
pub fn row_link(row: &Row) -> Option<(&str, String)> {
    let raw = row.get(LINK_COLUMN)?;
    let url = Url::parse(raw).ok()?;
    Some((raw.as_str(), tooltip(&url)))
}

pub fn tooltip(url: &Url) -> String {
    format!("Visit {}", domain(url))
}

/// Host name of the URL without a leading `www.` label.
pub fn domain(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    host.strip_prefix("www.").unwrap_or(host).to_string()
}
