//! PostgreSQL column types to column kinds, and dumped values to typed
//! statement parameters.

use crate::Result;
use crate::codec::BindValue;
use crate::models::ColumnKind;
use serde_json::Value as JsonValue;

/// Maps an `information_schema.columns.data_type` value to a column kind.
pub fn column_kind(data_type: &str) -> ColumnKind {
    match data_type.trim().to_lowercase().as_str() {
        "boolean" | "bool" => ColumnKind::Boolean,
        "bytea" => ColumnKind::Binary,
        _ => ColumnKind::Opaque,
    }
}

/// Renders JSON array elements in PostgreSQL array input syntax.
///
/// Strings are always double-quoted, nested arrays become nested braces and
/// JSON null becomes an unquoted `NULL` element. The result is bound as a
/// parameter and cast to the column's array type.
///
/// # Example
/// ```rust
/// use serde_json::json;
/// use tabledump_core::adapters::postgres::array_literal;
///
/// assert_eq!(array_literal(&[json!(1), json!(2)]), "{1,2}");
/// ```
pub fn array_literal(items: &[JsonValue]) -> String {
    let mut out = String::new();
    push_array(&mut out, items);
    out
}

fn push_array(out: &mut String, items: &[JsonValue]) {
    out.push('{');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            JsonValue::Null => out.push_str("NULL"),
            JsonValue::Bool(b) => out.push_str(if *b { "t" } else { "f" }),
            JsonValue::Number(n) => out.push_str(&n.to_string()),
            JsonValue::String(s) => push_quoted(out, s),
            JsonValue::Array(nested) => push_array(out, nested),
            JsonValue::Object(_) => push_quoted(out, &item.to_string()),
        }
    }
    out.push('}');
}

fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

/// A value bound for one PostgreSQL column.
///
/// Text parameters are cast to the column's type in the statement, so the
/// server parses them with its own input rules.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgParameter {
    Text(Option<String>),
    Bytes(Vec<u8>),
}

/// Converts a dumped value for a column of `column_type` (`format_type`
/// output, `None` when the target has no such column).
pub(crate) fn bind_parameter(value: &JsonValue, column_type: Option<&str>) -> Result<PgParameter> {
    let column_type = column_type.unwrap_or_default();
    if matches!(column_type, "json" | "jsonb") {
        return Ok(PgParameter::Text((!value.is_null()).then(|| value.to_string())));
    }
    if column_type.ends_with("[]")
        && let JsonValue::Array(items) = value
    {
        return Ok(PgParameter::Text(Some(array_literal(items))));
    }

    let text = match BindValue::from_json(value, column_type == "bytea")? {
        BindValue::Null => None,
        BindValue::Bytes(bytes) => return Ok(PgParameter::Bytes(bytes)),
        BindValue::Bool(b) if matches!(column_type, "smallint" | "integer" | "bigint") => {
            Some(if b { "1" } else { "0" }.to_string())
        }
        BindValue::Bool(b) => Some(b.to_string()),
        BindValue::Int(i) => Some(i.to_string()),
        BindValue::Decimal(text) | BindValue::Text(text) => Some(text),
    };
    Ok(PgParameter::Text(text))
}
