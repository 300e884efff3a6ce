use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::EntityDefinition;

/// Summary of the insert-dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for dependency ordering across a set of entity definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencySummary,
    pub create_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic dependency report. Self references are ignored.
pub fn build_dependency_report(definitions: &[EntityDefinition]) -> DependencyReport {
    let nodes: Vec<&EntityDefinition> = definitions.iter().collect();
    let graph = build_adjacency(&nodes);
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = DependencySummary {
        nodes: graph.len(),
        edges,
    };

    match layered_toposort(&graph) {
        Ok(layers) => DependencyReport {
            summary,
            create_order: Some(layers.into_iter().flatten().collect()),
            cycle: None,
        },
        Err(cycle) => DependencyReport {
            summary,
            create_order: None,
            cycle: Some(cycle),
        },
    }
}

/// Order in which tables must be created so every referenced table exists first.
pub fn creation_order(definitions: &[EntityDefinition]) -> Result<Vec<String>> {
    let report = build_dependency_report(definitions);
    match (report.create_order, report.cycle) {
        (Some(order), _) => Ok(order),
        (None, cycle) => Err(Error::Cycle(cycle.unwrap_or_default())),
    }
}

/// Edges run from a referenced entity to the entities that reference it.
///
/// Only entities present in `nodes` participate; references to anything else
/// are treated as already satisfied.
pub(crate) fn build_adjacency(nodes: &[&EntityDefinition]) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = nodes
        .iter()
        .map(|definition| (definition.name.clone(), BTreeSet::new()))
        .collect();

    for definition in nodes {
        for referenced in definition.dependencies() {
            if let Some(dependents) = graph.get_mut(referenced) {
                dependents.insert(definition.name.clone());
            }
        }
    }

    graph
}

/// Kahn's algorithm run in waves: each layer holds the nodes whose
/// dependencies all sit in earlier layers. Returns the nodes left on a cycle
/// when the graph is not a DAG.
pub(crate) fn layered_toposort(
    graph: &BTreeMap<String, BTreeSet<String>>,
) -> std::result::Result<Vec<Vec<String>>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> =
        graph.keys().map(|node| (node.as_str(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter_map(|(node, count)| if *count == 0 { Some(*node) } else { None })
        .collect();

    let mut layers = Vec::new();
    let mut placed = 0;

    while !ready.is_empty() {
        let mut next: BTreeSet<&str> = BTreeSet::new();

        for node in &ready {
            if let Some(targets) = graph.get(*node) {
                for target in targets {
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
        layers.push(ready.iter().map(|node| node.to_string()).collect());
        ready = next.into_iter().collect();
    }

    if placed == graph.len() {
        Ok(layers)
    } else {
        Err(indegree
            .into_iter()
            .filter_map(|(node, count)| if count > 0 { Some(node.to_string()) } else { None })
            .collect())
    }
}
