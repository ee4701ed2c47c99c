//! Minimal CSV encoding and decoding (RFC 4180 quoting).
//!
//! The channels this crate writes are narrow and fully under our control,
//! so a small codec with exhaustive tests beats pulling in a full CSV
//! stack. Quoted fields may contain commas, escaped quotes, and newlines.

/// Quote a field when it contains a delimiter, quote, or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render one row as a CSV line (no trailing newline).
pub fn format_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a whole CSV document into rows of fields.
///
/// Handles quoted fields spanning commas and line breaks. Trailing empty
/// lines are dropped; interior blank lines produce no row.
pub fn parse(content: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;

    let mut chars = content.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() && !field_started => {
                in_quotes = true;
                field_started = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_row(&mut rows, &mut row, &mut field, &mut field_started);
            }
            '\n' => end_row(&mut rows, &mut row, &mut field, &mut field_started),
            _ => {
                field.push(ch);
                field_started = true;
            }
        }
    }
    end_row(&mut rows, &mut row, &mut field, &mut field_started);
    rows
}

fn end_row(
    rows: &mut Vec<Vec<String>>,
    row: &mut Vec<String>,
    field: &mut String,
    field_started: &mut bool,
) {
    // A bare newline after a complete row is not an empty row.
    if row.is_empty() && field.is_empty() && !*field_started {
        return;
    }
    row.push(std::mem::take(field));
    rows.push(std::mem::take(row));
    *field_started = false;
}
