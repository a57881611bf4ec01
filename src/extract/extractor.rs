//! Extraction traversal
//!
//! Tables are visited one at a time in total topological order so that
//! every child query sees the complete key set of its parents. Rows are
//! buffered per table and emitted only after every query has succeeded.

use std::collections::{HashMap, HashSet};

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::config::Root;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::QueryExecutor;
use crate::engine::types::Value;
use crate::extract::query::{build_child_query, build_root_query};
use crate::extract::selfref::fetch_self_ref_rows;
use crate::graph::toposort::topo_sort_all;
use crate::graph::Graph;
use crate::output::CopyScriptWriter;
use crate::schema::{ForeignKey, Table};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub verbose: bool,
    pub dry_run: bool,
}

/// Per-table result counts, sorted by table name.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub table_rows: Vec<(String, usize)>,
}

#[derive(Default)]
struct Collected {
    rows: HashMap<String, Vec<Vec<Value>>>,
    pks: HashMap<String, Vec<Vec<Value>>>,
}

impl Collected {
    fn add_row(&mut self, table: &Table, values: Vec<Value>) {
        if let Some(pk) = extract_pk(table, &values) {
            self.pks.entry(table.full_name()).or_default().push(pk);
        }
        self.rows.entry(table.full_name()).or_default().push(values);
    }

    fn pk_key_set(&self, table: &Table) -> HashSet<String> {
        self.rows
            .get(&table.full_name())
            .into_iter()
            .flatten()
            .filter_map(|row| extract_pk(table, row))
            .map(|pk| pk_key(&pk))
            .collect()
    }
}

pub struct Extractor<'a> {
    executor: &'a dyn QueryExecutor,
    graph: &'a Graph,
    roots: &'a [Root],
    options: ExtractOptions,
}

impl<'a> Extractor<'a> {
    pub fn new(
        executor: &'a dyn QueryExecutor,
        graph: &'a Graph,
        roots: &'a [Root],
        options: ExtractOptions,
    ) -> Self {
        Self {
            executor,
            graph,
            roots,
            options,
        }
    }

    /// Runs the traversal and, unless dry-run, writes the script to `out`.
    pub async fn run<W>(
        &self,
        cancel: &CancellationToken,
        out: &mut W,
    ) -> EngineResult<ExtractReport>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let root_where = self.validate_roots()?;

        let topo = topo_sort_all(self.graph);
        if topo.has_cycle {
            tracing::warn!(
                cycle_tables = ?topo.cycle_tables,
                "circular dependencies detected; cycle members load under replica mode"
            );
        }
        let order = topo.total_order();

        let mut collected = Collected::default();

        for table_name in &order {
            let Some(table) = self.graph.tables.get(table_name) else {
                continue;
            };

            if let Some(where_clause) = root_where.get(table.name.as_str()) {
                self.extract_root(cancel, table, *where_clause, &mut collected)
                    .await
                    .map_err(|e| contextualize(e, "extracting root", table_name))?;
            } else if self
                .graph
                .parents
                .get(table_name)
                .map_or(false, |p| !p.is_empty())
            {
                self.extract_child(cancel, table, &mut collected)
                    .await
                    .map_err(|e| contextualize(e, "extracting child", table_name))?;
            }
            // No parents and not a root: nothing seeds this table.

            if let Some(self_refs) = self.graph.self_refs.get(table_name) {
                self.extract_self_refs(cancel, table, self_refs, &mut collected)
                    .await
                    .map_err(|e| contextualize(e, "expanding self-reference", table_name))?;
            }
        }

        let report = build_report(&collected);

        if self.options.dry_run {
            return Ok(report);
        }

        let mut writer = CopyScriptWriter::new(out);
        writer.write_header().await?;
        for table_name in &order {
            let Some(table) = self.graph.tables.get(table_name) else {
                continue;
            };
            if let Some(rows) = collected.rows.get(table_name) {
                writer.write_table(table, rows).await?;
            }
        }
        writer.write_footer().await?;
        writer.flush().await?;

        Ok(report)
    }

    /// Every root must name an in-scope table before any query runs.
    fn validate_roots(&self) -> EngineResult<HashMap<&str, Option<&str>>> {
        let mut root_where = HashMap::new();
        for root in self.roots {
            if self.graph.table_by_name(&root.table).is_none() {
                return Err(EngineError::unknown_root(&root.table));
            }
            root_where.insert(root.table.as_str(), root.where_clause.as_deref());
        }
        Ok(root_where)
    }

    async fn extract_root(
        &self,
        cancel: &CancellationToken,
        table: &Table,
        where_clause: Option<&str>,
        collected: &mut Collected,
    ) -> EngineResult<()> {
        let sql = build_root_query(table, where_clause);

        if self.options.dry_run {
            println!("[root] {}: {}", table.full_name(), sql);
            return Ok(());
        }
        if self.options.verbose {
            tracing::info!(table = %table.full_name(), %sql, "extracting root");
        }

        let rows = self.executor.fetch(cancel, &sql, &[]).await?;
        let count = rows.len();
        for row in rows {
            collected.add_row(table, row.values);
        }

        if self.options.verbose {
            tracing::info!(table = %table.full_name(), rows = count, "root collected");
        }
        Ok(())
    }

    async fn extract_child(
        &self,
        cancel: &CancellationToken,
        table: &Table,
        collected: &mut Collected,
    ) -> EngineResult<()> {
        let Some(query) = build_child_query(table, self.graph, &collected.pks) else {
            return Ok(());
        };

        if self.options.dry_run {
            println!("[child] {}: {}", table.full_name(), query.sql);
            println!("  args: {:?}", query.params);
            return Ok(());
        }
        if self.options.verbose {
            tracing::info!(table = %table.full_name(), sql = %query.sql, "extracting child");
        }

        let rows = self.executor.fetch(cancel, &query.sql, &query.params).await?;
        let count = rows.len();
        for row in rows {
            collected.add_row(table, row.values);
        }

        if self.options.verbose {
            tracing::info!(table = %table.full_name(), rows = count, "child collected");
        }
        Ok(())
    }

    async fn extract_self_refs(
        &self,
        cancel: &CancellationToken,
        table: &Table,
        self_refs: &[ForeignKey],
        collected: &mut Collected,
    ) -> EngineResult<()> {
        for fk in self_refs {
            let seeds = match collected.pks.get(&table.full_name()) {
                Some(seeds) if !seeds.is_empty() => seeds.clone(),
                _ => continue,
            };

            let extra_rows = fetch_self_ref_rows(
                self.executor,
                cancel,
                table,
                fk,
                &seeds,
                self.options.dry_run,
            )
            .await?;

            let mut existing = collected.pk_key_set(table);
            for row in extra_rows {
                match extract_pk(table, &row) {
                    Some(pk) => {
                        if existing.insert(pk_key(&pk)) {
                            collected.add_row(table, row);
                        }
                    }
                    None => collected.add_row(table, row),
                }
            }

            if self.options.verbose {
                let total = collected
                    .rows
                    .get(&table.full_name())
                    .map_or(0, Vec::len);
                tracing::info!(
                    table = %table.full_name(),
                    rows = total,
                    "self-reference expanded"
                );
            }
        }
        Ok(())
    }
}

fn build_report(collected: &Collected) -> ExtractReport {
    let mut table_rows: Vec<(String, usize)> = collected
        .rows
        .iter()
        .map(|(name, rows)| (name.clone(), rows.len()))
        .collect();
    table_rows.sort();
    ExtractReport { table_rows }
}

fn contextualize(err: EngineError, context: &str, table: &str) -> EngineError {
    match err {
        EngineError::Cancelled => EngineError::Cancelled,
        EngineError::Query { message } => {
            EngineError::query(format!("{} {}: {}", context, table, message))
        }
        other => other,
    }
}

fn extract_pk(table: &Table, values: &[Value]) -> Option<Vec<Value>> {
    let pk = table.primary_key.as_ref()?;
    let col_idx: HashMap<&str, usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    Some(
        pk.columns
            .iter()
            .map(|name| {
                col_idx
                    .get(name.as_str())
                    .and_then(|idx| values.get(*idx))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

/// Stable string form of a key tuple, used for deduplication.
fn pk_key(pk: &[Value]) -> String {
    format!("{:?}", pk)
}
