// src/dag/order.rs

//! Execution order over the dirty set.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::errors::{Result, YesbuildError};
use crate::types::TaskName;

/// Order `dirty` so every task comes after the tasks it depends on.
///
/// `task_deps` maps a task to the tasks it depends on. Dependencies outside
/// `dirty` are already up to date and count as satisfied. Ties keep the
/// order of `dirty`.
///
/// A reduction pass that emits nothing while tasks remain means a cycle;
/// the error names every stuck task.
pub fn execution_order(
    dirty: &[TaskName],
    task_deps: &HashMap<TaskName, Vec<TaskName>>,
) -> Result<Vec<TaskName>> {
    let in_set: HashSet<&str> = dirty.iter().map(String::as_str).collect();
    let pending_deps = |task: &str| -> Vec<&str> {
        task_deps
            .get(task)
            .map(|deps| {
                deps.iter()
                    .map(String::as_str)
                    .filter(|d| in_set.contains(d))
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut emitted: HashSet<&str> = HashSet::new();
    let mut order: Vec<TaskName> = Vec::with_capacity(dirty.len());
    let mut frontier: Vec<&str> = Vec::new();

    for task in dirty {
        if emitted.contains(task.as_str()) || frontier.contains(&task.as_str()) {
            continue;
        }
        if pending_deps(task.as_str()).is_empty() {
            emitted.insert(task.as_str());
            order.push(task.clone());
        } else {
            frontier.push(task);
        }
    }

    while !frontier.is_empty() {
        let before = frontier.len();
        let mut next = Vec::with_capacity(before);

        for task in frontier {
            if pending_deps(task).iter().all(|d| emitted.contains(d)) {
                emitted.insert(task);
                order.push(task.to_string());
            } else {
                next.push(task);
            }
        }

        if next.len() == before {
            let stuck: Vec<TaskName> = next.iter().map(|t| t.to_string()).collect();
            let cycles = strongly_connected(&next, task_deps);
            warn!(?stuck, ?cycles, "dependency cycle detected");
            return Err(YesbuildError::Cycle(stuck));
        }
        frontier = next;
    }

    debug!(?order, "computed execution order");
    Ok(order)
}

/// Non-trivial strongly connected components among `tasks`, for diagnostics.
fn strongly_connected<'a>(
    tasks: &[&'a str],
    task_deps: &'a HashMap<TaskName, Vec<TaskName>>,
) -> Vec<Vec<TaskName>> {
    let mut graph: DiGraphMap<&'a str, ()> = DiGraphMap::new();
    for &task in tasks {
        graph.add_node(task);
    }
    for &task in tasks {
        for dep in task_deps.get(task).into_iter().flatten() {
            if graph.contains_node(dep.as_str()) {
                graph.add_edge(dep.as_str(), task, ());
            }
        }
    }

    tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || scc.iter().any(|&n| graph.contains_edge(n, n)))
        .map(|scc| {
            let mut names: Vec<TaskName> = scc.into_iter().map(str::to_string).collect();
            names.sort();
            names
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn deps(pairs: &[(&str, &[&str])]) -> HashMap<TaskName, Vec<TaskName>> {
        pairs
            .iter()
            .map(|(t, ds)| (t.to_string(), ds.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    fn names(xs: &[&str]) -> Vec<TaskName> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dependencies_come_first() {
        let d = deps(&[("b", &["a"]), ("c", &["b", "a"])]);
        let order = execution_order(&names(&["c", "b", "a"]), &d).unwrap();
        assert_eq!(order, names(&["a", "b", "c"]));
    }

    #[test]
    fn deps_outside_dirty_set_are_satisfied() {
        let d = deps(&[("b", &["a"])]);
        let order = execution_order(&names(&["b"]), &d).unwrap();
        assert_eq!(order, names(&["b"]));
    }

    #[test]
    fn cycle_names_stuck_tasks() {
        let d = deps(&[("a", &["b"]), ("b", &["a"]), ("c", &["a"]), ("d", &[])]);
        let err = execution_order(&names(&["a", "b", "c", "d"]), &d).unwrap_err();
        match err {
            YesbuildError::Cycle(mut stuck) => {
                stuck.sort();
                assert_eq!(stuck, names(&["a", "b", "c"]));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn scc_diagnostics_exclude_bystanders() {
        let d = deps(&[("a", &["b"]), ("b", &["a"]), ("c", &["a"])]);
        let sccs = strongly_connected(&["a", "b", "c"], &d);
        assert_eq!(sccs, vec![names(&["a", "b"])]);
    }

    proptest! {
        // Edges only point from higher to lower indices, so the graph is acyclic.
        #[test]
        fn acyclic_graphs_order_topologically(
            n in 1usize..10,
            edges in proptest::collection::vec((0usize..10, 0usize..10), 0..30)
        ) {
            let tasks: Vec<TaskName> = (0..n).map(|i| format!("t{i}")).collect();
            let mut d: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
            for (x, y) in edges {
                let (x, y) = (x % n, y % n);
                if x > y {
                    d.entry(tasks[x].clone()).or_default().push(tasks[y].clone());
                }
            }

            let order = execution_order(&tasks, &d).unwrap();
            prop_assert_eq!(order.len(), n);
            let pos: HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();
            for (task, ds) in &d {
                for dep in ds {
                    prop_assert!(pos[dep.as_str()] < pos[task.as_str()]);
                }
            }
        }
    }
}
