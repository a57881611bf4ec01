//! Graph rendering for the analyze command

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::graph::components::find_components;
use crate::graph::toposort::{topo_sort, topo_sort_all};
use crate::graph::Graph;

/// Renders the graph as a Mermaid diagram, one subgraph per connected
/// component.
pub fn mermaid(g: &Graph) -> String {
    let components = find_components(g);
    let mut out = String::new();

    out.push_str("graph TD\n");

    for (i, comp) in components.iter().enumerate() {
        let _ = writeln!(out, "    subgraph component_{}", i + 1);

        let table_set: BTreeSet<&str> = comp.tables.iter().map(String::as_str).collect();

        let mut edges_written = BTreeSet::new();
        for edge in &g.edges {
            if !table_set.contains(edge.child_table.as_str()) {
                continue;
            }
            let label = edge.fk.child_columns.join(", ");
            let line = format!(
                "        {} -->|{}| {}",
                node_id(&edge.child_table),
                label,
                node_id(&edge.parent_table)
            );
            if edges_written.insert(line.clone()) {
                out.push_str(&line);
                out.push('\n');
            }
        }

        for t in &comp.tables {
            for fk in g.self_refs.get(t).into_iter().flatten() {
                let _ = writeln!(
                    out,
                    "        {} -->|{}| {}",
                    node_id(t),
                    fk.child_columns.join(", "),
                    node_id(t)
                );
            }
        }

        for t in &comp.tables {
            if !has_edge(g, t, &table_set) {
                let _ = writeln!(out, "        {}", node_id(t));
            }
        }

        out.push_str("    end\n");
        if i < components.len() - 1 {
            out.push('\n');
        }
    }

    out
}

/// Renders a text summary: counts, warnings, and per-component
/// topological detail.
pub fn text_summary(g: &Graph) -> String {
    let components = find_components(g);
    let mut out = String::new();

    let self_ref_count: usize = g.self_refs.values().map(Vec::len).sum();
    let _ = writeln!(out, "Tables: {}", g.tables.len());
    let _ = writeln!(out, "Foreign Keys: {}", g.edges.len() + self_ref_count);
    let _ = writeln!(out, "Connected Components: {}\n", components.len());

    let topo = topo_sort_all(g);
    if topo.has_cycle {
        let _ = writeln!(
            out,
            "WARNING: Circular dependencies detected: {:?}\n",
            topo.cycle_tables
        );
    }

    let no_pk: Vec<&String> = g
        .tables
        .iter()
        .filter(|(_, t)| t.primary_key.is_none())
        .map(|(name, _)| name)
        .collect();
    if !no_pk.is_empty() {
        let _ = writeln!(out, "WARNING: Tables without primary key: {:?}\n", no_pk);
    }

    if !g.self_refs.is_empty() {
        let tables: Vec<&String> = g.self_refs.keys().collect();
        let _ = writeln!(out, "Self-referencing tables: {:?}\n", tables);
    }

    let _ = writeln!(out, "Root tables (no FK parents): {:?}\n", g.source_tables());

    for (i, comp) in components.iter().enumerate() {
        let _ = writeln!(
            out,
            "=== Component {} ({} tables) ===",
            i + 1,
            comp.tables.len()
        );

        let topo = topo_sort(g, &comp.tables);
        if topo.has_cycle {
            out.push_str("  Topological order (partial, has cycle):\n");
        } else {
            out.push_str("  Topological order:\n");
        }
        for (j, t) in topo.order.iter().enumerate() {
            let table = &g.tables[t];
            let pk_info = match &table.primary_key {
                Some(pk) => format!("PK: {}", pk.columns.join(", ")),
                None => "no PK".to_string(),
            };
            let fk_count = table
                .foreign_keys
                .iter()
                .filter(|fk| !fk.is_self_ref)
                .count();
            let _ = writeln!(
                out,
                "    {}. {} ({} cols, {}, {} FKs)",
                j + 1,
                t,
                table.columns.len(),
                pk_info,
                fk_count
            );
        }
        if topo.has_cycle {
            let _ = writeln!(out, "  Cycle tables: {:?}", topo.cycle_tables);
        }
        out.push('\n');
    }

    out
}

/// Converts a schema.table name to a Mermaid-safe node identifier.
fn node_id(full_name: &str) -> String {
    full_name.replace('.', "_")
}

fn has_edge(g: &Graph, table: &str, component_tables: &BTreeSet<&str>) -> bool {
    for edge in &g.edges {
        if edge.child_table == table && component_tables.contains(edge.parent_table.as_str()) {
            return true;
        }
        if edge.parent_table == table && component_tables.contains(edge.child_table.as_str()) {
            return true;
        }
    }
    g.self_refs.contains_key(table)
}
