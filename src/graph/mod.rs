//! FK dependency graph
//!
//! Edges point child → parent, following the constraint direction. The
//! graph also keeps reverse indices and undirected adjacency so that the
//! analyzer can walk it either way. All containers are ordered maps, which
//! makes every traversal deterministic.

pub mod components;
pub mod render;
pub mod toposort;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::VirtualRelation;
use crate::schema::{ForeignKey, Table, VirtualKind};

/// A directed edge from child to parent.
#[derive(Debug, Clone)]
pub struct Edge {
    pub fk: ForeignKey,
    pub child_table: String,
    pub parent_table: String,
}

#[derive(Debug, Default)]
pub struct Graph {
    /// Full name -> table.
    pub tables: BTreeMap<String, Table>,
    /// Non-self-referential FK edges.
    pub edges: Vec<Edge>,
    /// Self-referential FKs keyed by table full name.
    pub self_refs: BTreeMap<String, Vec<ForeignKey>>,
    /// Parent full name -> child full names.
    pub children: BTreeMap<String, Vec<String>>,
    /// Child full name -> parent full names.
    pub parents: BTreeMap<String, Vec<String>>,
    /// Undirected adjacency for connectivity.
    pub adjacency: BTreeMap<String, BTreeSet<String>>,
}

/// Constructs the graph from introspected tables.
///
/// Tables whose unqualified name is in `exclude` are skipped. FKs whose
/// parent falls outside the retained set are dropped. Virtual relations
/// are appended to the child's FK list before edges are derived, so they
/// flow through the same machinery as real constraints.
pub fn build(
    tables: HashMap<String, Table>,
    exclude: &HashSet<String>,
    virtual_relations: &[VirtualRelation],
) -> Graph {
    let mut g = Graph::default();

    for (name, table) in tables {
        if exclude.contains(&table.name) {
            continue;
        }
        g.adjacency.insert(name.clone(), BTreeSet::new());
        g.tables.insert(name, table);
    }

    for vr in virtual_relations {
        inject_virtual_relation(&mut g.tables, vr);
    }

    let names: Vec<String> = g.tables.keys().cloned().collect();
    for name in names {
        let fks = g.tables[&name].foreign_keys.clone();
        for fk in fks {
            let parent_key = fk.parent_full_name();
            if !g.tables.contains_key(&parent_key) {
                continue; // parent table not in scope
            }

            if fk.is_self_ref {
                g.self_refs.entry(name.clone()).or_default().push(fk);
                continue;
            }

            g.children
                .entry(parent_key.clone())
                .or_default()
                .push(name.clone());
            g.parents
                .entry(name.clone())
                .or_default()
                .push(parent_key.clone());
            g.adjacency
                .get_mut(&name)
                .expect("retained table has adjacency")
                .insert(parent_key.clone());
            g.adjacency
                .get_mut(&parent_key)
                .expect("retained table has adjacency")
                .insert(name.clone());
            g.edges.push(Edge {
                child_table: name.clone(),
                parent_table: parent_key,
                fk,
            });
        }
    }

    g
}

fn inject_virtual_relation(tables: &mut BTreeMap<String, Table>, vr: &VirtualRelation) {
    let Some(child_key) = find_table_key(tables, &vr.child_table) else {
        return;
    };
    let Some(parent_key) = find_table_key(tables, &vr.parent_table) else {
        return;
    };

    let virtual_kind = match vr.kind.as_str() {
        "array" => VirtualKind::Array,
        "json" => VirtualKind::Json,
        _ => VirtualKind::None,
    };

    let parent = &tables[&parent_key];
    let (parent_schema, parent_table) = (parent.schema.clone(), parent.name.clone());
    let child = tables.get_mut(&child_key).expect("resolved child key");

    let fk = ForeignKey {
        name: format!(
            "virtual_{}_{}_{}",
            child.name, vr.child_column, parent_table
        ),
        child_schema: child.schema.clone(),
        child_table: child.name.clone(),
        child_columns: vec![vr.child_column.clone()],
        parent_schema,
        parent_table,
        parent_columns: vec![vr.parent_column.clone()],
        is_self_ref: child_key == parent_key,
        virtual_kind,
        json_path: vr.json_path.clone(),
    };
    child.foreign_keys.push(fk);
}

/// Finds the full "schema.table" key by qualified or unqualified name.
fn find_table_key(tables: &BTreeMap<String, Table>, name: &str) -> Option<String> {
    if tables.contains_key(name) {
        return Some(name.to_string());
    }
    tables
        .iter()
        .find(|(_, t)| t.name == name)
        .map(|(key, _)| key.clone())
}

impl Graph {
    /// Tables that have no FK parents.
    pub fn source_tables(&self) -> Vec<String> {
        self.tables
            .keys()
            .filter(|name| self.parents.get(*name).map_or(true, |p| p.is_empty()))
            .cloned()
            .collect()
    }

    /// Finds a table by its unqualified name.
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.values().find(|t| t.name == name)
    }
}
