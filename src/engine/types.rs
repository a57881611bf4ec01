//! Universal value types for the extraction engine
//!
//! Rows come back from the executor as vectors of [`Value`], one per column
//! in ordinal order. The same enum is used for bind parameters, so query
//! composition and row collection share a single representation.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Universal value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    /// Text form as PostgreSQL would render the value, used when a JSON
    /// field reference compares against collected key values.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("\\x{}", hex::encode(b)),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string(),
            Value::Json(j) => j.to_string(),
            Value::Array(_) => format!("{:?}", self),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A single row of data (indexed by column order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_text_matches_postgres_rendering() {
        assert_eq!(Value::Int(42).to_text(), "42");
        assert_eq!(Value::Text("abc".into()).to_text(), "abc");
        assert_eq!(Value::Bool(true).to_text(), "true");
        assert_eq!(Value::Null.to_text(), "");
    }

    #[test]
    fn bytes_serialize_as_base64() {
        let v = Value::Bytes(vec![0xde, 0xad]);
        let json = serde_json::to_string(&v).expect("serialize");
        assert_eq!(json, "\"3q0=\"");
    }
}
