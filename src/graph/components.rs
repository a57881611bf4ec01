//! Connected component detection

use std::collections::{BTreeSet, VecDeque};

use crate::graph::Graph;

/// A connected component of tables.
#[derive(Debug, Clone)]
pub struct Component {
    pub tables: Vec<String>,
}

/// Detects connected components over the undirected adjacency with BFS.
/// Components come back sorted internally and ordered by their smallest
/// member name.
pub fn find_components(g: &Graph) -> Vec<Component> {
    let mut visited = BTreeSet::new();
    let mut components = Vec::new();

    for name in g.tables.keys() {
        if visited.contains(name) {
            continue;
        }
        let mut tables = bfs(g, name, &mut visited);
        tables.sort();
        components.push(Component { tables });
    }

    components.sort_by(|a, b| a.tables.first().cmp(&b.tables.first()));
    components
}

fn bfs(g: &Graph, start: &str, visited: &mut BTreeSet<String>) -> Vec<String> {
    let mut queue = VecDeque::from([start.to_string()]);
    visited.insert(start.to_string());
    let mut result = Vec::new();

    while let Some(node) = queue.pop_front() {
        for neighbor in g.adjacency.get(&node).into_iter().flatten() {
            if visited.insert(neighbor.clone()) {
                queue.push_back(neighbor.clone());
            }
        }
        result.push(node);
    }

    result
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::graph::testutil::{fk, table};

    #[test]
    fn separate_islands_become_separate_components() {
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
        let tenants = table("public", "tenants", &[("id", "int8", false)], &["id"]);
        let lonely = table("public", "settings", &[("key", "text", false)], &["key"]);

        let mut tables = HashMap::new();
        for t in [users, tenants, lonely] {
            tables.insert(t.full_name(), t);
        }
        let g = crate::graph::build(tables, &HashSet::new(), &[]);

        let components = find_components(&g);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].tables, vec!["public.settings"]);
        assert_eq!(
            components[1].tables,
            vec!["public.tenants", "public.users"]
        );
    }
}
