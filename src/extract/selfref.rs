//! Self-reference expansion
//!
//! A collected row in a hierarchy may reference ancestors that no child
//! query will ever pull in. The recursive query walks the chain upward
//! from the already-collected rows.

use tokio_util::sync::CancellationToken;

use crate::engine::error::EngineResult;
use crate::engine::traits::QueryExecutor;
use crate::engine::types::Value;
use crate::extract::query::build_self_ref_query;
use crate::schema::{ForeignKey, Table};

pub async fn fetch_self_ref_rows(
    executor: &dyn QueryExecutor,
    cancel: &CancellationToken,
    table: &Table,
    fk: &ForeignKey,
    seed_pks: &[Vec<Value>],
    dry_run: bool,
) -> EngineResult<Vec<Vec<Value>>> {
    let Some(query) = build_self_ref_query(table, fk, seed_pks) else {
        return Ok(Vec::new());
    };

    if dry_run {
        println!("[self-ref] {}: {}", table.full_name(), query.sql);
        println!("  args: {:?}", query.params);
        return Ok(Vec::new());
    }

    tracing::debug!(table = %table.full_name(), fk = %fk.name, "running self-ref query");

    let rows = executor.fetch(cancel, &query.sql, &query.params).await?;
    Ok(rows.into_iter().map(|r| r.values).collect())
}
