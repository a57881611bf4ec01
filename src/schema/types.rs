//! Introspected schema model
//!
//! These types are populated once from the catalog and treated as
//! immutable afterwards. Virtual relations injected during graph
//! construction reuse [`ForeignKey`] with a non-default [`VirtualKind`].

use serde::{Deserialize, Serialize};

/// A table column in ordinal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// PostgreSQL type name (e.g. "int4", "text", "_int4" for arrays).
    pub data_type: String,
    pub nullable: bool,
    /// Ordinal position (1-based).
    pub ordinal: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
}

/// How a foreign key is expressed on the child side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtualKind {
    /// A real constraint, or a virtual one over a plain scalar column.
    #[default]
    None,
    /// Parent keys are elements of an array column.
    Array,
    /// Parent keys live under a JSON field of the child column.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub child_schema: String,
    pub child_table: String,
    pub child_columns: Vec<String>,
    pub parent_schema: String,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
    pub is_self_ref: bool,
    #[serde(default)]
    pub virtual_kind: VirtualKind,
    #[serde(default)]
    pub json_path: Option<String>,
}

impl ForeignKey {
    pub fn parent_full_name(&self) -> String {
        format!("{}.{}", self.parent_schema, self.parent_table)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Schema-qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// All column names in ordinal order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key column names, empty if the table has no PK.
    pub fn pk_column_names(&self) -> &[String] {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.as_slice())
            .unwrap_or(&[])
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}
