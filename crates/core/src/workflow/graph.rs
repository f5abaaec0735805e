use crate::error::ValidationError;
use crate::rules::ConnectionRules;
use crate::types::{Connection, Task, TaskId};
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Validated DAG over a workflow's tasks.
///
/// Building the graph is the validation step: every check runs before any
/// capability is invoked, and building twice on the same input yields the
/// same result with no side effects.
#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
}

impl TaskGraph {
    /// Validate tasks and connections against the rule table and build the
    /// execution graph.
    ///
    /// Checks, in order: connection endpoints exist, every edge's type pair
    /// is allowed, the graph is acyclic, required config keys are covered,
    /// and no config key has more than one incoming writer.
    pub fn build(
        tasks: &[Task],
        connections: &[Connection],
        rules: &ConnectionRules,
    ) -> Result<Self, ValidationError> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<TaskId, NodeIndex> = HashMap::new();

        // Node insertion order is the declared task order; ordering below
        // relies on it for tie-breaking.
        for task in tasks {
            let node = graph.add_node(task.clone());
            indices.insert(task.id.clone(), node);
        }

        // Endpoint existence for every connection, before any type check.
        let mut endpoints = Vec::with_capacity(connections.len());
        for connection in connections {
            let source = *indices.get(&connection.source).ok_or_else(|| {
                ValidationError::UnknownTask {
                    task_id: connection.source.clone(),
                }
            })?;
            let target = *indices.get(&connection.target).ok_or_else(|| {
                ValidationError::UnknownTask {
                    task_id: connection.target.clone(),
                }
            })?;
            endpoints.push((source, target));
        }

        for (source, target) in endpoints {
            let source_type = graph[source].task_type;
            let target_type = graph[target].task_type;
            if !rules.is_valid(source_type, target_type) {
                return Err(ValidationError::InvalidConnection {
                    source_type,
                    target_type,
                });
            }

            graph.add_edge(source, target, ());
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(ValidationError::CyclicGraph);
        }

        check_config_coverage(tasks, connections, rules)?;

        Ok(Self { graph })
    }

    /// Tasks in execution order: topological (sources before targets), ties
    /// between independent tasks broken by declared order. A workflow with
    /// no connections runs in exactly the declared order.
    pub fn execution_order(&self) -> Vec<Task> {
        let mut indegree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| {
                let incoming = self
                    .graph
                    .neighbors_directed(n, petgraph::Direction::Incoming)
                    .count();
                (n, incoming)
            })
            .collect();

        // Min-heap on node index keeps ready tasks in declared order.
        let mut ready: BinaryHeap<Reverse<NodeIndex>> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(n, _)| Reverse(*n))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.graph[node].clone());
            for successor in self
                .graph
                .neighbors_directed(node, petgraph::Direction::Outgoing)
            {
                if let Some(degree) = indegree.get_mut(&successor) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(successor));
                    }
                }
            }
        }

        order
    }
}

/// Hardening pass: every required config key must be set on the task itself
/// or fed by exactly one incoming connection.
fn check_config_coverage(
    tasks: &[Task],
    connections: &[Connection],
    rules: &ConnectionRules,
) -> Result<(), ValidationError> {
    let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();

    for task in tasks {
        // Keys written by incoming connections, with writer counts.
        let mut fed: HashMap<&str, usize> = HashMap::new();
        for connection in connections.iter().filter(|c| c.target == task.id) {
            let Some(source) = by_id.get(&connection.source) else {
                continue;
            };
            if let Some(key) = rules.output_key(source.task_type, task.task_type) {
                *fed.entry(key).or_default() += 1;
            }
        }

        for (key, writers) in &fed {
            if *writers > 1 {
                return Err(ValidationError::ConflictingInputs {
                    task_id: task.id.clone(),
                    key: key.to_string(),
                });
            }
        }

        for key in task.task_type.required_config_keys() {
            if !task.config.has_value(key) && !fed.contains_key(key) {
                return Err(ValidationError::MissingConfig {
                    task_id: task.id.clone(),
                    key: key.to_string(),
                });
            }
        }
    }

    Ok(())
}
