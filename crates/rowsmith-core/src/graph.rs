use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::DatabaseSchema;

/// Summary of FK graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for FK dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphReport {
    pub summary: FkGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub levels: Option<Vec<Vec<String>>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic FK dependency report for a database schema.
///
/// Self-references are not dependencies: a table never waits on itself.
pub fn build_fk_graph_report(schema: &DatabaseSchema) -> FkGraphReport {
    let graph = build_adjacency(schema);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = FkGraphSummary { nodes, edges };

    match dependency_levels(&graph) {
        Ok(levels) => FkGraphReport {
            summary,
            topo_order: Some(levels.iter().flatten().cloned().collect()),
            levels: Some(levels),
            cycle: None,
        },
        Err(cycle) => FkGraphReport {
            summary,
            topo_order: None,
            levels: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(schema: &DatabaseSchema) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for db_schema in &schema.schemas {
        for table in &db_schema.tables {
            let table_key = format!("{}.{}", db_schema.name, table.name);
            graph.entry(table_key.clone()).or_default();

            for fk in table.foreign_keys() {
                let referenced = format!("{}.{}", fk.referenced_schema, fk.referenced_table);
                if referenced == table_key {
                    continue;
                }
                graph
                    .entry(referenced)
                    .or_default()
                    .insert(table_key.clone());
            }
        }
    }

    graph
}

/// Layer a parent -> children graph into barrier levels.
///
/// Every node lands in the first level after all of its parents. Nodes within
/// a level are sorted, so the layering is independent of insertion order.
/// Self-edges are ignored. On a cycle, the nodes that could not be placed are
/// returned as the error.
pub fn dependency_levels(
    graph: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<Vec<String>>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();

    for (node, targets) in graph {
        indegree.entry(node.as_str()).or_insert(0);
        for target in targets {
            if target != node {
                *indegree.entry(target.as_str()).or_insert(0) += 1;
            }
        }
    }

    let total = indegree.len();
    let mut ready: Vec<&str> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then_some(*node))
        .collect();

    let mut levels = Vec::new();
    let mut placed = 0;

    while !ready.is_empty() {
        let mut next = BTreeSet::new();
        for node in &ready {
            if let Some(targets) = graph.get(*node) {
                for target in targets {
                    if target.as_str() == *node {
                        continue;
                    }
                    if let Some(count) = indegree.get_mut(target.as_str()) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next.insert(target.as_str());
                        }
                    }
                }
            }
        }
        placed += ready.len();
        levels.push(ready.iter().map(|node| node.to_string()).collect());
        ready = next.into_iter().collect();
    }

    if placed == total {
        Ok(levels)
    } else {
        let cycle_nodes: Vec<String> = indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then(|| node.to_string()))
            .collect();
        Err(cycle_nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{Constraint, ForeignKey};
    use crate::schema::{Column, DatabaseSchema, Schema, Table, TypeClass};

    fn column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            type_class: TypeClass::Integer,
            is_nullable: false,
            is_auto_generated: false,
            character_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            enum_values: Vec::new(),
        }
    }

    fn fk(column: &str, parent: &str) -> Constraint {
        Constraint::ForeignKey(ForeignKey {
            name: Some(format!("fk_{column}")),
            columns: vec![column.to_string()],
            referenced_schema: "public".to_string(),
            referenced_table: parent.to_string(),
            referenced_columns: vec!["id".to_string()],
            condition: None,
        })
    }

    fn table(name: &str, constraints: Vec<Constraint>) -> Table {
        Table {
            name: name.to_string(),
            columns: vec![column("id"), column("parent_id")],
            constraints,
        }
    }

    fn schema(tables: Vec<Table>) -> DatabaseSchema {
        DatabaseSchema {
            schema_version: "0.1".to_string(),
            engine: "postgres".to_string(),
            schemas: vec![Schema {
                name: "public".to_string(),
                tables,
            }],
        }
    }

    #[test]
    fn toposort_reports_cycle() {
        let schema = schema(vec![
            table("a", vec![fk("parent_id", "b")]),
            table("b", vec![fk("parent_id", "a")]),
        ]);

        let report = build_fk_graph_report(&schema);
        assert!(report.topo_order.is_none());
        let cycle = report.cycle.expect("expected cycle");
        assert!(cycle.contains(&"public.a".to_string()));
        assert!(cycle.contains(&"public.b".to_string()));
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let schema = schema(vec![table("users", vec![fk("parent_id", "users")])]);

        let report = build_fk_graph_report(&schema);
        assert_eq!(
            report.topo_order.expect("expected toposort"),
            vec!["public.users".to_string()]
        );
    }

    #[test]
    fn toposort_orders_dependencies() {
        let schema = schema(vec![
            table("orders", vec![fk("parent_id", "users")]),
            table("users", Vec::new()),
        ]);

        let report = build_fk_graph_report(&schema);
        let order = report.topo_order.expect("expected toposort");
        let users_idx = order
            .iter()
            .position(|item| item == "public.users")
            .expect("users present");
        let orders_idx = order
            .iter()
            .position(|item| item == "public.orders")
            .expect("orders present");
        assert!(users_idx < orders_idx);
    }

    #[test]
    fn levels_group_independent_tables() {
        let schema = schema(vec![
            table("items", vec![fk("parent_id", "orders")]),
            table("orders", vec![fk("parent_id", "users")]),
            table("products", Vec::new()),
            table("users", Vec::new()),
        ]);

        let levels = build_fk_graph_report(&schema)
            .levels
            .expect("expected levels");
        assert_eq!(
            levels,
            vec![
                vec!["public.products".to_string(), "public.users".to_string()],
                vec!["public.orders".to_string()],
                vec!["public.items".to_string()],
            ]
        );
    }
}
