//! COPY text-format value encoding

use crate::engine::types::Value;

/// Encodes a single value for a COPY text-format field. NULL is `\N`.
pub fn escape_copy_value(value: &Value) -> String {
    match value {
        Value::Null => "\\N".to_string(),
        Value::Bool(b) => if *b { "t" } else { "f" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bytes(b) => format!("\\\\x{}", hex::encode(b)),
        Value::Timestamp(ts) => {
            escape_string(&ts.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string())
        }
        Value::Text(s) => escape_string(s),
        Value::Json(j) => escape_string(&j.to_string()),
        Value::Array(items) => escape_string(&array_literal(items)),
    }
}

/// Applies COPY text-format escaping to a string.
fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders an array value in PostgreSQL array-literal syntax.
fn array_literal(items: &[Value]) -> String {
    let rendered: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Array(inner) => array_literal(inner),
            other => other.to_text(),
        })
        .collect();
    format!("{{{}}}", rendered.join(","))
}
