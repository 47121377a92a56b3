//! Dependency resolution: orders objects so DDL can be emitted without
//! forward references.
//!
//! Kahn's algorithm over the graph's dependency edges, with a deterministic
//! ready-set ordering: objects become eligible once all their dependencies
//! are placed, and among eligible objects the one with the lowest
//! (kind rank, catalog position) key is emitted next. Kind rank puts tables
//! before views and views before routines, so unrelated objects still come
//! out in the conventional script order.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SchemaScriptError};
use crate::models::{ObjectGraph, ObjectRef};

/// Produces a topological ordering of the graph, or fails with
/// `DependencyCycle` naming the members of one concrete cycle.
///
/// Edges pointing at objects outside the graph (unselected or dropped
/// targets) do not constrain ordering. The result is deterministic for a
/// given graph snapshot.
pub fn order(graph: &ObjectGraph) -> Result<Vec<ObjectRef>> {
    let refs = graph.refs();
    let in_graph: HashSet<&ObjectRef> = refs.iter().collect();

    // Unsatisfied dependency counts, restricted to edges inside the graph.
    let mut pending: HashMap<&ObjectRef, usize> = HashMap::with_capacity(refs.len());
    let mut dependents: HashMap<&ObjectRef, Vec<&ObjectRef>> = HashMap::new();

    for reference in refs {
        let deps: Vec<&ObjectRef> = graph
            .dependencies(reference)
            .iter()
            .filter(|d| *d != reference && in_graph.contains(d))
            .collect();
        pending.insert(reference, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(reference);
        }
    }

    let sort_key = |r: &ObjectRef| (r.kind.rank(), graph.position(r).unwrap_or(usize::MAX));

    let mut ready: Vec<&ObjectRef> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(r, _)| *r)
        .collect();
    let mut ordered = Vec::with_capacity(refs.len());

    while !ready.is_empty() {
        // Lowest key next; the ready set is small, a scan is enough.
        let mut next_at = 0;
        for i in 1..ready.len() {
            if sort_key(ready[i]) < sort_key(ready[next_at]) {
                next_at = i;
            }
        }
        let next = ready.swap_remove(next_at);
        ordered.push(next.clone());

        if let Some(waiting) = dependents.get(next) {
            for &dependent in waiting {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(dependent);
                    }
                }
            }
        }
        pending.remove(next);
    }

    if ordered.len() < refs.len() {
        let members = find_cycle(graph, &pending);
        tracing::error!(members = members.len(), "dependency cycle detected");
        return Err(SchemaScriptError::DependencyCycle { members });
    }

    tracing::debug!(objects = ordered.len(), "dependency order resolved");
    Ok(ordered)
}

/// Walks unresolved edges from a leftover node until one repeats, returning
/// the members of the cycle in reference order.
fn find_cycle(graph: &ObjectGraph, pending: &HashMap<&ObjectRef, usize>) -> Vec<ObjectRef> {
    let stuck: HashSet<&ObjectRef> = pending.keys().copied().collect();
    let Some(start) = stuck
        .iter()
        .min_by_key(|r| graph.position(r).unwrap_or(usize::MAX))
    else {
        return Vec::new();
    };

    let mut path: Vec<&ObjectRef> = Vec::new();
    let mut current = *start;
    loop {
        if let Some(at) = path.iter().position(|r| *r == current) {
            return path[at..].iter().map(|r| (*r).clone()).collect();
        }
        path.push(current);
        // Every stuck node has at least one unsatisfied dependency that is
        // itself stuck, so this walk always closes a loop.
        match graph
            .dependencies(current)
            .iter()
            .find(|d| stuck.contains(d))
        {
            Some(next) => current = next,
            None => return path.iter().map(|r| (*r).clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModuleDef, ObjectDef, ObjectKind, TableDef};

    fn table(graph: &mut ObjectGraph, schema: &str, name: &str) -> ObjectRef {
        let reference = ObjectRef::new(ObjectKind::Table, schema, name);
        graph.insert(ObjectDef::Table(TableDef {
            reference: reference.clone(),
            columns: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
        }));
        reference
    }

    fn view(graph: &mut ObjectGraph, schema: &str, name: &str, definition: &str) -> ObjectRef {
        let reference = ObjectRef::new(ObjectKind::View, schema, name);
        graph.insert(ObjectDef::Module(ModuleDef {
            reference: reference.clone(),
            definition: definition.to_string(),
        }));
        reference
    }

    #[test]
    fn referenced_tables_come_before_referencing_tables() {
        let mut graph = ObjectGraph::new();
        let orders = table(&mut graph, "dbo", "Orders");
        let customers = table(&mut graph, "dbo", "Customers");
        graph.add_dependency(orders.clone(), customers.clone());

        let ordered = order(&graph).unwrap();
        let pos = |r: &ObjectRef| ordered.iter().position(|o| o == r).unwrap();
        assert!(pos(&customers) < pos(&orders));
    }

    #[test]
    fn tables_precede_views_that_reference_them() {
        let mut graph = ObjectGraph::new();
        let v = view(&mut graph, "dbo", "vw_orders", "SELECT 1");
        let t = table(&mut graph, "dbo", "Orders");
        graph.add_dependency(v.clone(), t.clone());

        let ordered = order(&graph).unwrap();
        assert_eq!(ordered[0], t);
        assert_eq!(ordered[1], v);
    }

    #[test]
    fn unrelated_objects_keep_catalog_order_within_kind() {
        let mut graph = ObjectGraph::new();
        let z = table(&mut graph, "dbo", "Zeta");
        let a = table(&mut graph, "dbo", "Alpha");

        let ordered = order(&graph).unwrap();
        // Catalog enumeration order, not alphabetical
        assert_eq!(ordered, vec![z, a]);
    }

    #[test]
    fn ordering_is_deterministic_across_runs() {
        let mut graph = ObjectGraph::new();
        let t1 = table(&mut graph, "dbo", "A");
        let t2 = table(&mut graph, "dbo", "B");
        let v1 = view(&mut graph, "dbo", "V1", "SELECT 1");
        let v2 = view(&mut graph, "dbo", "V2", "SELECT 2");
        graph.add_dependency(v1.clone(), t1.clone());
        graph.add_dependency(v2.clone(), v1.clone());
        graph.add_dependency(t2.clone(), t1.clone());

        let first = order(&graph).unwrap();
        let second = order(&graph).unwrap();
        assert_eq!(first, second);

        let pos = |r: &ObjectRef| first.iter().position(|o| o == r).unwrap();
        assert!(pos(&t1) < pos(&t2));
        assert!(pos(&t1) < pos(&v1));
        assert!(pos(&v1) < pos(&v2));
    }

    #[test]
    fn mutually_referencing_views_fail_with_named_cycle() {
        let mut graph = ObjectGraph::new();
        let a = view(&mut graph, "dbo", "vw_a", "SELECT * FROM vw_b");
        let b = view(&mut graph, "dbo", "vw_b", "SELECT * FROM vw_a");
        graph.add_dependency(a.clone(), b.clone());
        graph.add_dependency(b.clone(), a.clone());

        let err = order(&graph).unwrap_err();
        match err {
            SchemaScriptError::DependencyCycle { members } => {
                assert!(members.contains(&a));
                assert!(members.contains(&b));
            }
            other => panic!("expected DependencyCycle, got {other:?}"),
        }
    }

    #[test]
    fn edges_to_unselected_objects_are_ignored() {
        let mut graph = ObjectGraph::new();
        let orders = table(&mut graph, "sales", "Orders");
        // FK to a table that was not selected (single-table mode)
        graph.add_dependency(
            orders.clone(),
            ObjectRef::new(ObjectKind::Table, "dbo", "Customers"),
        );

        let ordered = order(&graph).unwrap();
        assert_eq!(ordered, vec![orders]);
    }

    #[test]
    fn self_referencing_table_is_not_a_cycle() {
        let mut graph = ObjectGraph::new();
        let employees = table(&mut graph, "dbo", "Employees");
        graph.add_dependency(employees.clone(), employees.clone());

        let ordered = order(&graph).unwrap();
        assert_eq!(ordered, vec![employees]);
    }
}
