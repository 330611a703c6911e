//! Identifier and literal quoting
//!
//! Every name embedded in generated SQL goes through `quote_identifier`,
//! including tokens such as extension versions that are not strictly
//! identifiers.

/// Wraps `name` in double quotes, doubling embedded quotes and dropping NUL bytes.
pub fn quote_identifier(name: &str) -> String {
    let escaped = name.replace('\0', "").replace('"', "\"\"");
    format!("\"{escaped}\"")
}

/// Wraps `value` in single quotes, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\0', "").replace('\'', "''");
    format!("'{escaped}'")
}

/// Quotes and joins a column list: `"a", "b"`.
pub fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ")
}
