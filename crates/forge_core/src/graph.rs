//! Dependency graph construction and cycle detection.
//!
//! Edges come from two sources: references found in a node's properties, and
//! the node's explicit `depends_on` hints. Both are merged into one
//! deduplicated set per node before the graph is checked for cycles.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::node::ResourceNode;
use crate::value::LogicalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Acyclic dependency graph over one stack's nodes, indexed by insertion order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    stack: String,
    ids: Vec<LogicalId>,
    index: HashMap<LogicalId, usize>,
    /// `dependencies[b]` holds every `a` such that edge `(a, b)` exists.
    dependencies: Vec<BTreeSet<usize>>,
    dependents: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Build the graph for `nodes` and reject it if it contains a cycle.
    pub fn build(stack: &str, nodes: &[ResourceNode]) -> SynthResult<Self> {
        let graph = Self::build_unchecked(stack, nodes)?;
        graph.check_acyclic()?;
        debug!(
            "Built dependency graph for {}: {} nodes, {} edges",
            stack,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Build the adjacency structure without the cycle check.
    pub(crate) fn build_unchecked(stack: &str, nodes: &[ResourceNode]) -> SynthResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(SynthError::DuplicateLogicalId {
                    stack: stack.to_string(),
                    id: node.id.clone(),
                });
            }
        }

        let mut dependencies = vec![BTreeSet::new(); nodes.len()];
        let mut dependents = vec![BTreeSet::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            let implicit = node.referenced_ids();
            let explicit = node.explicit_depends_on.iter();

            for target in implicit.into_iter().chain(explicit) {
                let Some(&j) = index.get(target) else {
                    return Err(SynthError::UnknownReference {
                        stack: stack.to_string(),
                        from: node.id.to_string(),
                        target: target.clone(),
                    });
                };
                dependencies[i].insert(j);
                dependents[j].insert(i);
            }
        }

        Ok(Self {
            stack: stack.to_string(),
            ids: nodes.iter().map(|n| n.id.clone()).collect(),
            index,
            dependencies,
            dependents,
        })
    }

    /// Three-color depth-first search. A dependency that is still in progress
    /// closes a cycle, reported as the ids along the current path where each
    /// id depends on the next one.
    fn check_acyclic(&self) -> SynthResult<()> {
        let mut marks = vec![Mark::Unvisited; self.ids.len()];

        for root in 0..self.ids.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            marks[root] = Mark::InProgress;
            let mut path = vec![(root, self.dependencies[root].iter())];

            loop {
                let (node, next) = match path.last_mut() {
                    Some((node, deps)) => (*node, deps.next().copied()),
                    None => break,
                };

                match next {
                    Some(dep) => match marks[dep] {
                        Mark::Unvisited => {
                            marks[dep] = Mark::InProgress;
                            path.push((dep, self.dependencies[dep].iter()));
                        }
                        Mark::InProgress => {
                            let start = path.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                            let members: Vec<usize> = path[start..].iter().map(|(n, _)| *n).collect();
                            return Err(SynthError::CyclicDependency {
                                stack: self.stack.clone(),
                                cycle: self.canonical_cycle(members),
                            });
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[node] = Mark::Done;
                        path.pop();
                    }
                }
            }
        }

        Ok(())
    }

    /// Rotate a cycle so it starts at its earliest-declared member.
    fn canonical_cycle(&self, mut members: Vec<usize>) -> Vec<LogicalId> {
        if let Some(min_pos) = members
            .iter()
            .enumerate()
            .min_by_key(|(_, idx)| **idx)
            .map(|(pos, _)| pos)
        {
            members.rotate_left(min_pos);
        }
        members.into_iter().map(|i| self.ids[i].clone()).collect()
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> &[LogicalId] {
        &self.ids
    }

    pub fn index_of(&self, id: &LogicalId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn dependency_indices(&self, i: usize) -> &BTreeSet<usize> {
        &self.dependencies[i]
    }

    pub(crate) fn dependent_indices(&self, i: usize) -> &BTreeSet<usize> {
        &self.dependents[i]
    }

    /// Nodes that `id` depends on, in insertion order.
    pub fn dependencies(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.index_of(id)
            .map(|i| self.dependencies[i].iter().map(|&j| &self.ids[j]).collect())
            .unwrap_or_default()
    }

    /// Nodes that depend on `id`, in insertion order.
    pub fn dependents(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.index_of(id)
            .map(|i| self.dependents[i].iter().map(|&j| &self.ids[j]).collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
