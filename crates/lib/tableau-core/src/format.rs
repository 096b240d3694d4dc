//! Markdown rendering for row-oriented results.

use serde_json::Value;
use tableau_model::Row;

use crate::error::FormatError;

/// Renders rows as a markdown table.
///
/// Columns are the keys of the first row, in their original order.
///
/// # Errors
/// Returns `FormatError::Empty` when there are no rows.
pub fn to_markdown_table(rows: &[Row]) -> Result<String, FormatError> {
    let first = rows.first().ok_or(FormatError::Empty)?;
    let headers: Vec<&String> = first.keys().collect();
    if headers.is_empty() {
        return Err(FormatError::Empty);
    }

    let mut table = String::new();
    push_line(&mut table, headers.iter().map(|header| escape_cell(header)));
    push_line(&mut table, headers.iter().map(|_| "---".to_string()));
    for row in rows {
        push_line(
            &mut table,
            headers
                .iter()
                .map(|header| row.get(header.as_str()).map_or_else(String::new, render_cell)),
        );
    }
    Ok(table)
}

fn push_line(table: &mut String, cells: impl Iterator<Item = String>) {
    table.push_str("| ");
    table.push_str(&cells.collect::<Vec<_>>().join(" | "));
    table.push_str(" |\n");
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => escape_cell(text),
        other => escape_cell(&other.to_string()),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
