use chrono::NaiveDate;

/// Helper function to format the date
///
/// This function takes a `NaiveDate` and formats it as a string in the "dd-mm-yyyy" format.
///
/// # Arguments
///
/// * `date` - A `NaiveDate` object representing the date to be formatted
///
/// # Returns
///
/// A `String` containing the formatted date
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Escapes one CSV field.
///
/// Fields containing a comma, quote or line break are wrapped in quotes with
/// inner quotes doubled; everything else is written as-is.
pub fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Joins a header and rows into a CSV document with `\n` line endings.
pub fn to_csv(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = header
        .iter()
        .map(|h| escape_csv(h))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    for row in rows {
        out.push_str(
            &row.iter()
                .map(|field| escape_csv(field))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

/// Quotes a Postgres identifier so it can be spliced into DDL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Trims an optional text field, turning blank input into `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
