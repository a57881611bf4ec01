//! SQL composition for extraction queries
//!
//! All generated statements use positional bind parameters; the parameter
//! index threads through condition builders so several FK conditions can
//! share one statement.

use std::collections::HashMap;

use crate::engine::types::Value;
use crate::graph::Graph;
use crate::schema::{ForeignKey, Table, VirtualKind};

/// Hard cap on the number of key tuples bound into a single IN list.
pub const MAX_IN_VALUES: usize = 10_000;

/// A statement together with its bind values.
#[derive(Debug, Clone)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Query for a root table; the user predicate is appended verbatim.
pub fn build_root_query(table: &Table, where_clause: Option<&str>) -> String {
    let mut sql = format!("SELECT * FROM {}", table.full_name());
    if let Some(clause) = where_clause.filter(|c| !c.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

/// Query for a child table, constraining each FK against the key tuples
/// collected for its parent. Returns None when no FK has collected
/// parents, in which case the table is skipped.
pub fn build_child_query(
    table: &Table,
    g: &Graph,
    collected_pks: &HashMap<String, Vec<Vec<Value>>>,
) -> Option<BoundQuery> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    let mut arg_idx = 1usize;

    for fk in &table.foreign_keys {
        if fk.is_self_ref {
            continue;
        }
        let Some(pks) = collected_pks.get(&fk.parent_full_name()) else {
            continue;
        };
        if pks.is_empty() {
            continue;
        }
        let pks = capped(pks, &fk.parent_full_name());

        let condition = match fk.virtual_kind {
            VirtualKind::Array => array_overlap(table, g, fk, pks, &mut params, &mut arg_idx),
            VirtualKind::Json => json_path_in(fk, pks, &mut params, &mut arg_idx),
            VirtualKind::None => {
                if fk.child_columns.len() == 1 {
                    single_column_in(fk, pks, &mut params, &mut arg_idx)
                } else {
                    composite_in(fk, pks, &mut params, &mut arg_idx)
                }
            }
        };

        conditions.push(wrap_nullable(table, fk, condition));
    }

    if conditions.is_empty() {
        return None;
    }

    Some(BoundQuery {
        sql: format!(
            "SELECT * FROM {} WHERE {}",
            table.full_name(),
            conditions.join(" AND ")
        ),
        params,
    })
}

/// Recursive CTE walking a self-referential FK toward ancestors, seeded
/// with the key tuples already collected for the table.
pub fn build_self_ref_query(
    table: &Table,
    fk: &ForeignKey,
    seed_pks: &[Vec<Value>],
) -> Option<BoundQuery> {
    let pk = table.primary_key.as_ref()?;
    if seed_pks.is_empty() {
        return None;
    }
    let seed_pks = capped(seed_pks, &table.full_name());

    let mut params = Vec::new();
    let mut arg_idx = 1usize;
    let seed_cond = key_in_condition(&pk.columns, seed_pks, &mut params, &mut arg_idx);

    let join_conds: Vec<String> = fk
        .child_columns
        .iter()
        .zip(&fk.parent_columns)
        .map(|(child_col, parent_col)| format!("t.{} = r.{}", parent_col, child_col))
        .collect();

    let sql = format!(
        "WITH RECURSIVE tree AS (\n  SELECT t.* FROM {} t WHERE {}\n  UNION ALL\n  SELECT t.* FROM {} t JOIN tree r ON {}\n)\nSELECT DISTINCT * FROM tree",
        table.full_name(),
        seed_cond,
        table.full_name(),
        join_conds.join(" AND ")
    );

    Some(BoundQuery { sql, params })
}

fn capped<'a>(pks: &'a [Vec<Value>], table: &str) -> &'a [Vec<Value>] {
    if pks.len() > MAX_IN_VALUES {
        tracing::warn!(
            table,
            total = pks.len(),
            cap = MAX_IN_VALUES,
            "key set exceeds IN-list cap, truncating"
        );
        &pks[..MAX_IN_VALUES]
    } else {
        pks
    }
}

fn single_column_in(
    fk: &ForeignKey,
    pks: &[Vec<Value>],
    params: &mut Vec<Value>,
    arg_idx: &mut usize,
) -> String {
    let placeholders = bind_first_elements(pks, params, arg_idx);
    format!("{} IN ({})", fk.child_columns[0], placeholders.join(", "))
}

fn composite_in(
    fk: &ForeignKey,
    pks: &[Vec<Value>],
    params: &mut Vec<Value>,
    arg_idx: &mut usize,
) -> String {
    let mut tuples = Vec::with_capacity(pks.len());
    for pk in pks {
        let mut placeholders = Vec::with_capacity(fk.child_columns.len());
        for j in 0..fk.child_columns.len() {
            placeholders.push(format!("${}", arg_idx));
            params.push(pk.get(j).cloned().unwrap_or(Value::Null));
            *arg_idx += 1;
        }
        tuples.push(format!("({})", placeholders.join(", ")));
    }
    format!(
        "({}) IN ({})",
        fk.child_columns.join(", "),
        tuples.join(", ")
    )
}

fn array_overlap(
    table: &Table,
    g: &Graph,
    fk: &ForeignKey,
    pks: &[Vec<Value>],
    params: &mut Vec<Value>,
    arg_idx: &mut usize,
) -> String {
    let placeholders = bind_first_elements(pks, params, arg_idx);
    let cast = array_element_type(table, g, fk)
        .map(|elem| format!("::{}[]", elem))
        .unwrap_or_default();
    format!(
        "{} && ARRAY[{}]{}",
        fk.child_columns[0],
        placeholders.join(", "),
        cast
    )
}

fn json_path_in(
    fk: &ForeignKey,
    pks: &[Vec<Value>],
    params: &mut Vec<Value>,
    arg_idx: &mut usize,
) -> String {
    let mut placeholders = Vec::with_capacity(pks.len());
    for pk in pks {
        placeholders.push(format!("${}", arg_idx));
        let v = pk.first().cloned().unwrap_or(Value::Null);
        params.push(Value::Text(v.to_text()));
        *arg_idx += 1;
    }
    let path = fk
        .json_path
        .as_deref()
        .unwrap_or_else(|| fk.parent_columns[0].as_str());
    format!(
        "({}->>'{}') IN ({})",
        fk.child_columns[0],
        path,
        placeholders.join(", ")
    )
}

fn bind_first_elements(
    pks: &[Vec<Value>],
    params: &mut Vec<Value>,
    arg_idx: &mut usize,
) -> Vec<String> {
    let mut placeholders = Vec::with_capacity(pks.len());
    for pk in pks {
        placeholders.push(format!("${}", arg_idx));
        params.push(pk.first().cloned().unwrap_or(Value::Null));
        *arg_idx += 1;
    }
    placeholders
}

/// `(col) IN` or `(col1, col2) IN` over full key tuples.
fn key_in_condition(
    columns: &[String],
    pks: &[Vec<Value>],
    params: &mut Vec<Value>,
    arg_idx: &mut usize,
) -> String {
    if columns.len() == 1 {
        let mut placeholders = Vec::with_capacity(pks.len());
        for pk in pks {
            placeholders.push(format!("${}", arg_idx));
            params.push(pk.first().cloned().unwrap_or(Value::Null));
            *arg_idx += 1;
        }
        return format!("{} IN ({})", columns[0], placeholders.join(", "));
    }

    let mut tuples = Vec::with_capacity(pks.len());
    for pk in pks {
        let mut placeholders = Vec::with_capacity(columns.len());
        for j in 0..columns.len() {
            placeholders.push(format!("${}", arg_idx));
            params.push(pk.get(j).cloned().unwrap_or(Value::Null));
            *arg_idx += 1;
        }
        tuples.push(format!("({})", placeholders.join(", ")));
    }
    format!("({}) IN ({})", columns.join(", "), tuples.join(", "))
}

/// A row whose FK slots are all NULL references nothing and must still be
/// extractable alongside its parents.
fn wrap_nullable(table: &Table, fk: &ForeignKey, condition: String) -> String {
    let nullable = fk
        .child_columns
        .iter()
        .any(|name| table.column(name).map(|c| c.nullable).unwrap_or(false));
    if !nullable {
        return condition;
    }

    if fk.child_columns.len() == 1 {
        format!("({} OR {} IS NULL)", condition, fk.child_columns[0])
    } else {
        let null_checks: Vec<String> = fk
            .child_columns
            .iter()
            .map(|c| format!("{} IS NULL", c))
            .collect();
        format!("({} OR ({}))", condition, null_checks.join(" AND "))
    }
}

/// Element type for the array-overlap cast: the declared element type of
/// the child column when it is an array, otherwise the parent key column
/// type. Unknown types skip the cast.
fn array_element_type(table: &Table, g: &Graph, fk: &ForeignKey) -> Option<String> {
    if let Some(col) = table.column(&fk.child_columns[0]) {
        if let Some(elem) = col.data_type.strip_prefix('_') {
            return Some(elem.to_string());
        }
    }
    let parent = g.tables.get(&fk.parent_full_name())?;
    parent
        .column(&fk.parent_columns[0])
        .map(|c| c.data_type.clone())
}
