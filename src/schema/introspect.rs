//! Catalog introspection
//!
//! Three schema-parameterized queries against the system catalogs populate
//! the table map: columns, primary keys, foreign keys. Column order follows
//! attnum; PK and FK column order follows the constraint's key position.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::QueryExecutor;
use crate::engine::types::{Row, Value};
use crate::schema::types::{Column, ForeignKey, PrimaryKey, Table};

const COLUMNS_QUERY: &str = r#"
SELECT
    n.nspname AS schema_name,
    c.relname AS table_name,
    a.attname AS column_name,
    t.typname AS data_type,
    NOT a.attnotnull AS is_nullable,
    a.attnum AS ordinal_position
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_attribute a ON a.attrelid = c.oid
JOIN pg_type t ON t.oid = a.atttypid
WHERE c.relkind = 'r'
    AND a.attnum > 0
    AND NOT a.attisdropped
    AND n.nspname = ANY($1)
ORDER BY n.nspname, c.relname, a.attnum
"#;

const PRIMARY_KEYS_QUERY: &str = r#"
SELECT
    n.nspname AS schema_name,
    c.relname AS table_name,
    a.attname AS column_name,
    u.ord AS key_position
FROM pg_constraint con
JOIN pg_class c ON c.oid = con.conrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS u(attnum, ord)
JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = u.attnum
WHERE con.contype = 'p'
    AND n.nspname = ANY($1)
ORDER BY n.nspname, c.relname, u.ord
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
SELECT
    con.conname AS fk_name,
    cn.nspname AS child_schema,
    cc.relname AS child_table,
    ca.attname AS child_column,
    pn.nspname AS parent_schema,
    pc.relname AS parent_table,
    pa.attname AS parent_column,
    u.ord AS key_position
FROM pg_constraint con
JOIN pg_class cc ON cc.oid = con.conrelid
JOIN pg_namespace cn ON cn.oid = cc.relnamespace
JOIN pg_class pc ON pc.oid = con.confrelid
JOIN pg_namespace pn ON pn.oid = pc.relnamespace
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS u(child_attnum, parent_attnum, ord)
JOIN pg_attribute ca ON ca.attrelid = cc.oid AND ca.attnum = u.child_attnum
JOIN pg_attribute pa ON pa.attrelid = pc.oid AND pa.attnum = u.parent_attnum
WHERE con.contype = 'f'
    AND cn.nspname = ANY($1)
ORDER BY con.conname, u.ord
"#;

/// Queries the catalogs and returns all tables keyed by "schema.table".
pub async fn introspect(
    executor: &dyn QueryExecutor,
    cancel: &CancellationToken,
    schemas: &[String],
) -> EngineResult<HashMap<String, Table>> {
    if schemas.is_empty() {
        return Ok(HashMap::new());
    }

    let schema_param = vec![Value::Array(
        schemas.iter().map(|s| Value::Text(s.clone())).collect(),
    )];

    let rows = executor
        .fetch(cancel, COLUMNS_QUERY, &schema_param)
        .await
        .map_err(|e| wrap(e, "querying tables and columns"))?;
    let mut tables = collect_columns(&rows)?;

    let rows = executor
        .fetch(cancel, PRIMARY_KEYS_QUERY, &schema_param)
        .await
        .map_err(|e| wrap(e, "querying primary keys"))?;
    collect_primary_keys(&rows, &mut tables)?;

    let rows = executor
        .fetch(cancel, FOREIGN_KEYS_QUERY, &schema_param)
        .await
        .map_err(|e| wrap(e, "querying foreign keys"))?;
    collect_foreign_keys(&rows, &mut tables)?;

    Ok(tables)
}

fn wrap(err: EngineError, context: &str) -> EngineError {
    match err {
        EngineError::Cancelled => EngineError::Cancelled,
        other => EngineError::introspection(format!("{}: {}", context, other)),
    }
}

fn collect_columns(rows: &[Row]) -> EngineResult<HashMap<String, Table>> {
    let mut tables = HashMap::new();

    for row in rows {
        let schema_name = text_at(row, 0)?;
        let table_name = text_at(row, 1)?;
        let column_name = text_at(row, 2)?;
        let data_type = text_at(row, 3)?;
        let nullable = bool_at(row, 4)?;
        let ordinal = int_at(row, 5)? as i32;

        let key = format!("{}.{}", schema_name, table_name);
        let table = tables.entry(key).or_insert_with(|| Table {
            schema: schema_name,
            name: table_name,
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
        });
        table.columns.push(Column {
            name: column_name,
            data_type,
            nullable,
            ordinal,
        });
    }

    Ok(tables)
}

fn collect_primary_keys(rows: &[Row], tables: &mut HashMap<String, Table>) -> EngineResult<()> {
    for row in rows {
        let schema_name = text_at(row, 0)?;
        let table_name = text_at(row, 1)?;
        let column_name = text_at(row, 2)?;

        let key = format!("{}.{}", schema_name, table_name);
        let Some(table) = tables.get_mut(&key) else {
            continue;
        };
        table
            .primary_key
            .get_or_insert_with(|| PrimaryKey { columns: Vec::new() })
            .columns
            .push(column_name);
    }

    Ok(())
}

fn collect_foreign_keys(rows: &[Row], tables: &mut HashMap<String, Table>) -> EngineResult<()> {
    // Group multi-column constraints by name, preserving encounter order.
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, ForeignKey> = HashMap::new();

    for row in rows {
        let fk_name = text_at(row, 0)?;
        let child_schema = text_at(row, 1)?;
        let child_table = text_at(row, 2)?;
        let child_column = text_at(row, 3)?;
        let parent_schema = text_at(row, 4)?;
        let parent_table = text_at(row, 5)?;
        let parent_column = text_at(row, 6)?;

        let fk = grouped.entry(fk_name.clone()).or_insert_with(|| {
            order.push(fk_name.clone());
            let is_self_ref = child_schema == parent_schema && child_table == parent_table;
            ForeignKey {
                name: fk_name,
                child_schema,
                child_table,
                child_columns: Vec::new(),
                parent_schema,
                parent_table,
                parent_columns: Vec::new(),
                is_self_ref,
                virtual_kind: Default::default(),
                json_path: None,
            }
        });
        fk.child_columns.push(child_column);
        fk.parent_columns.push(parent_column);
    }

    for name in order {
        let fk = grouped.remove(&name).expect("grouped by construction");
        let child_key = format!("{}.{}", fk.child_schema, fk.child_table);
        if let Some(table) = tables.get_mut(&child_key) {
            table.foreign_keys.push(fk);
        }
    }

    Ok(())
}

fn text_at(row: &Row, idx: usize) -> EngineResult<String> {
    match row.values.get(idx) {
        Some(Value::Text(s)) => Ok(s.clone()),
        other => Err(EngineError::introspection(format!(
            "unexpected catalog value at column {}: {:?}",
            idx, other
        ))),
    }
}

fn bool_at(row: &Row, idx: usize) -> EngineResult<bool> {
    match row.values.get(idx) {
        Some(Value::Bool(b)) => Ok(*b),
        other => Err(EngineError::introspection(format!(
            "unexpected catalog value at column {}: {:?}",
            idx, other
        ))),
    }
}

fn int_at(row: &Row, idx: usize) -> EngineResult<i64> {
    match row.values.get(idx) {
        Some(Value::Int(i)) => Ok(*i),
        other => Err(EngineError::introspection(format!(
            "unexpected catalog value at column {}: {:?}",
            idx, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CatalogStub {
        columns: Vec<Row>,
        pks: Vec<Row>,
        fks: Vec<Row>,
    }

    #[async_trait]
    impl QueryExecutor for CatalogStub {
        async fn fetch(
            &self,
            _cancel: &CancellationToken,
            sql: &str,
            _params: &[Value],
        ) -> EngineResult<Vec<Row>> {
            if sql.contains("attisdropped") {
                Ok(self.columns.clone())
            } else if sql.contains("contype = 'p'") {
                Ok(self.pks.clone())
            } else {
                Ok(self.fks.clone())
            }
        }
    }

    fn col_row(schema: &str, table: &str, col: &str, ty: &str, nullable: bool, ord: i64) -> Row {
        Row::new(vec![
            Value::Text(schema.into()),
            Value::Text(table.into()),
            Value::Text(col.into()),
            Value::Text(ty.into()),
            Value::Bool(nullable),
            Value::Int(ord),
        ])
    }

    fn pk_row(schema: &str, table: &str, col: &str, ord: i64) -> Row {
        Row::new(vec![
            Value::Text(schema.into()),
            Value::Text(table.into()),
            Value::Text(col.into()),
            Value::Int(ord),
        ])
    }

    fn fk_row(
        name: &str,
        child: (&str, &str, &str),
        parent: (&str, &str, &str),
        ord: i64,
    ) -> Row {
        Row::new(vec![
            Value::Text(name.into()),
            Value::Text(child.0.into()),
            Value::Text(child.1.into()),
            Value::Text(child.2.into()),
            Value::Text(parent.0.into()),
            Value::Text(parent.1.into()),
            Value::Text(parent.2.into()),
            Value::Int(ord),
        ])
    }

    #[tokio::test]
    async fn assembles_tables_with_composite_fk() {
        let stub = CatalogStub {
            columns: vec![
                col_row("public", "orders", "tenant_id", "int8", false, 1),
                col_row("public", "orders", "order_no", "int8", false, 2),
                col_row("public", "order_lines", "tenant_id", "int8", false, 1),
                col_row("public", "order_lines", "order_no", "int8", false, 2),
                col_row("public", "order_lines", "sku", "text", true, 3),
            ],
            pks: vec![
                pk_row("public", "orders", "tenant_id", 1),
                pk_row("public", "orders", "order_no", 2),
            ],
            fks: vec![
                fk_row(
                    "order_lines_orders_fkey",
                    ("public", "order_lines", "tenant_id"),
                    ("public", "orders", "tenant_id"),
                    1,
                ),
                fk_row(
                    "order_lines_orders_fkey",
                    ("public", "order_lines", "order_no"),
                    ("public", "orders", "order_no"),
                    2,
                ),
            ],
        };

        let cancel = CancellationToken::new();
        let tables = introspect(&stub, &cancel, &["public".to_string()])
            .await
            .expect("introspect");

        assert_eq!(tables.len(), 2);

        let orders = &tables["public.orders"];
        assert_eq!(orders.column_names(), vec!["tenant_id", "order_no"]);
        assert_eq!(orders.pk_column_names(), ["tenant_id", "order_no"]);

        let lines = &tables["public.order_lines"];
        assert!(lines.primary_key.is_none());
        assert_eq!(lines.foreign_keys.len(), 1);
        let fk = &lines.foreign_keys[0];
        assert_eq!(fk.child_columns, vec!["tenant_id", "order_no"]);
        assert_eq!(fk.parent_columns, vec!["tenant_id", "order_no"]);
        assert!(!fk.is_self_ref);
    }

    #[tokio::test]
    async fn self_referential_fk_is_flagged() {
        let stub = CatalogStub {
            columns: vec![
                col_row("public", "categories", "id", "int8", false, 1),
                col_row("public", "categories", "parent_id", "int8", true, 2),
            ],
            pks: vec![pk_row("public", "categories", "id", 1)],
            fks: vec![fk_row(
                "categories_parent_fkey",
                ("public", "categories", "parent_id"),
                ("public", "categories", "id"),
                1,
            )],
        };

        let cancel = CancellationToken::new();
        let tables = introspect(&stub, &cancel, &["public".to_string()])
            .await
            .expect("introspect");

        assert!(tables["public.categories"].foreign_keys[0].is_self_ref);
    }

    #[tokio::test]
    async fn empty_schema_set_returns_empty_map() {
        let stub = CatalogStub {
            columns: vec![],
            pks: vec![],
            fks: vec![],
        };
        let cancel = CancellationToken::new();
        let tables = introspect(&stub, &cancel, &[]).await.expect("introspect");
        assert!(tables.is_empty());
    }
}
