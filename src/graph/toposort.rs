//! Topological ordering with cycle detection (Kahn's algorithm)

use std::collections::{BTreeMap, VecDeque};

use crate::graph::Graph;

/// Result of a topological sort.
#[derive(Debug, Clone)]
pub struct TopoResult {
    /// Tables in dependency order: parents first, then children.
    pub order: Vec<String>,
    pub has_cycle: bool,
    /// Tables whose in-degree never reached zero.
    pub cycle_tables: Vec<String>,
}

impl TopoResult {
    /// The acyclic order with cycle members appended, giving a total
    /// traversal order even when cycles exist.
    pub fn total_order(&self) -> Vec<String> {
        let mut order = self.order.clone();
        order.extend(self.cycle_tables.iter().cloned());
        order
    }
}

/// Sorts the given subset of tables. Self-referential FKs are not edges
/// and never contribute to in-degree.
pub fn topo_sort(g: &Graph, tables: &[String]) -> TopoResult {
    let table_set: BTreeMap<&str, ()> = tables.iter().map(|t| (t.as_str(), ())).collect();

    let mut in_degree: BTreeMap<&str, usize> =
        tables.iter().map(|t| (t.as_str(), 0)).collect();
    let mut local_children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for t in tables {
        for p in g.parents.get(t).into_iter().flatten() {
            if table_set.contains_key(p.as_str()) {
                local_children.entry(p.as_str()).or_default().push(t.as_str());
                *in_degree.get_mut(t.as_str()).expect("subset member") += 1;
            }
        }
    }
    for children in local_children.values_mut() {
        children.sort();
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(tables.len());
    while let Some(node) = queue.pop_front() {
        order.push(node.to_string());

        for child in local_children.get(node).into_iter().flatten() {
            let deg = in_degree.get_mut(child).expect("subset member");
            *deg -= 1;
            if *deg == 0 {
                queue.push_back(*child);
            }
        }
    }

    let has_cycle = order.len() < tables.len();
    let cycle_tables = if has_cycle {
        in_degree
            .iter()
            .filter(|(_, deg)| **deg > 0)
            .map(|(name, _)| name.to_string())
            .collect()
    } else {
        Vec::new()
    };

    TopoResult {
        order,
        has_cycle,
        cycle_tables,
    }
}

/// Sorts every table in the graph.
pub fn topo_sort_all(g: &Graph) -> TopoResult {
    let all: Vec<String> = g.tables.keys().cloned().collect();
    topo_sort(g, &all)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::graph::testutil::{fk, table};
    use crate::schema::Table;

    fn graph_from(tables: Vec<Table>) -> Graph {
        let mut map = HashMap::new();
        for t in tables {
            map.insert(t.full_name(), t);
        }
        crate::graph::build(map, &HashSet::new(), &[])
    }

    #[test]
    fn chain_sorts_parents_first() {
        let tenants = table("public", "tenants", &[("id", "int8", false)], &["id"]);
        let mut users = table(
            "public",
            "users",
            &[("id", "int8", false), ("tenant_id", "int8", false)],
            &["id"],
        );
        users.foreign_keys = vec![fk(
            "users_tenant_fkey",
            ("public", "users"),
            &["tenant_id"],
            ("public", "tenants"),
            &["id"],
        )];
        let mut orders = table(
            "public",
            "orders",
            &[("id", "int8", false), ("user_id", "int8", false)],
            &["id"],
        );
        orders.foreign_keys = vec![fk(
            "orders_user_fkey",
            ("public", "orders"),
            &["user_id"],
            ("public", "users"),
            &["id"],
        )];

        let g = graph_from(vec![tenants, users, orders]);
        let result = topo_sort_all(&g);

        assert!(!result.has_cycle);
        assert_eq!(
            result.order,
            vec!["public.tenants", "public.users", "public.orders"]
        );
    }

    #[test]
    fn two_table_cycle_is_reported() {
        let mut a = table(
            "public",
            "a",
            &[("id", "int8", false), ("b_id", "int8", true)],
            &["id"],
        );
        a.foreign_keys = vec![fk(
            "a_b_fkey",
            ("public", "a"),
            &["b_id"],
            ("public", "b"),
            &["id"],
        )];
        let mut b = table(
            "public",
            "b",
            &[("id", "int8", false), ("a_id", "int8", true)],
            &["id"],
        );
        b.foreign_keys = vec![fk(
            "b_a_fkey",
            ("public", "b"),
            &["a_id"],
            ("public", "a"),
            &["id"],
        )];

        let g = graph_from(vec![a, b]);
        let result = topo_sort_all(&g);

        assert!(result.has_cycle);
        assert_eq!(result.cycle_tables, vec!["public.a", "public.b"]);
        assert_eq!(result.total_order(), vec!["public.a", "public.b"]);
    }

    #[test]
    fn self_reference_does_not_create_a_cycle() {
        let mut cats = table(
            "public",
            "categories",
            &[("id", "int8", false), ("parent_id", "int8", true)],
            &["id"],
        );
        cats.foreign_keys = vec![fk(
            "categories_parent_fkey",
            ("public", "categories"),
            &["parent_id"],
            ("public", "categories"),
            &["id"],
        )];

        let g = graph_from(vec![cats]);
        let result = topo_sort_all(&g);
        assert!(!result.has_cycle);
        assert_eq!(result.order, vec!["public.categories"]);
    }

    #[test]
    fn subset_sort_ignores_edges_leaving_the_subset() {
        let tenants = table("public", "tenants", &[("id", "int8", false)], &["id"]);
        let mut users = table(
            "public",
            "users",
            &[("id", "int8", false), ("tenant_id", "int8", false)],
            &["id"],
        );
        users.foreign_keys = vec![fk(
            "users_tenant_fkey",
            ("public", "users"),
            &["tenant_id"],
            ("public", "tenants"),
            &["id"],
        )];

        let g = graph_from(vec![tenants, users]);
        let result = topo_sort(&g, &["public.users".to_string()]);
        assert!(!result.has_cycle);
        assert_eq!(result.order, vec!["public.users"]);
    }
}
