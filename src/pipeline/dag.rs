// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Step dependency graph
//!
//! Makes the step ordering explicit: an image built on another image has an
//! edge from that image's step, instead of relying on list position.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use crate::errors::PushflowError;
use crate::pipeline::Step;

/// Dependency graph over a pipeline's steps
pub struct StepGraph {
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    index_to_name: HashMap<NodeIndex, String>,
}

impl StepGraph {
    /// Build the graph from steps in declaration order
    pub fn build(steps: &[Step]) -> Result<Self, PushflowError> {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();
        let mut index_to_name = HashMap::new();

        for (idx, step) in steps.iter().enumerate() {
            let node = graph.add_node(idx);
            name_to_index.insert(step.name.clone(), node);
            index_to_name.insert(node, step.name.clone());
        }

        for step in steps {
            let step_node = name_to_index[&step.name];

            for dep_name in &step.depends_on {
                let dep_node = name_to_index.get(dep_name).ok_or_else(|| {
                    PushflowError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep_name.clone(),
                    }
                })?;

                if !graph.contains_edge(*dep_node, step_node) {
                    graph.add_edge(*dep_node, step_node, ());
                }
            }
        }

        let dag = Self {
            graph,
            name_to_index,
            index_to_name,
        };
        dag.validate_acyclic()?;

        Ok(dag)
    }

    fn validate_acyclic(&self) -> Result<(), PushflowError> {
        toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| PushflowError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            })
    }

    /// Walk forward from a node until it is revisited
    fn find_cycle_members(&self, start: NodeIndex) -> Vec<String> {
        let mut path = vec![start];
        let mut current = start;

        loop {
            let next = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .find(|n| petgraph::algo::has_path_connecting(&self.graph, *n, start, None));

            match next {
                Some(n) if n == start => break,
                Some(n) if !path.contains(&n) => {
                    path.push(n);
                    current = n;
                }
                _ => break,
            }
        }

        let mut names: Vec<String> = path.iter().map(|n| self.index_to_name[n].clone()).collect();
        names.push(self.index_to_name[&start].clone());
        names
    }

    /// Step indices in execution order
    ///
    /// Kahn's algorithm, always releasing the ready step that was declared
    /// first, so independent steps keep their declared order.
    pub fn execution_order(&self) -> Result<Vec<usize>, PushflowError> {
        self.validate_acyclic()?;

        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: BTreeSet<(usize, NodeIndex)> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| (self.graph[*n], *n))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some((idx, node)) = ready.pop_first() {
            order.push(idx);

            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert((self.graph[next], next));
                    }
                }
            }
        }

        Ok(order)
    }

    /// Step names in execution order
    pub fn execution_order_names(&self) -> Result<Vec<String>, PushflowError> {
        let by_index: HashMap<usize, &String> = self
            .index_to_name
            .iter()
            .map(|(node, name)| (self.graph[*node], name))
            .collect();

        Ok(self
            .execution_order()?
            .into_iter()
            .map(|idx| by_index[&idx].clone())
            .collect())
    }

    /// Get dependencies for a step (steps that must run before it)
    pub fn dependencies(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        let mut deps: Vec<(usize, String)> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|n| (self.graph[n], self.index_to_name[&n].clone()))
            .collect();
        deps.sort();
        Some(deps.into_iter().map(|(_, name)| name).collect())
    }

    /// Check if step A depends (directly or transitively) on step B
    pub fn depends_on(&self, step_a: &str, step_b: &str) -> bool {
        let Some(node_a) = self.name_to_index.get(step_a) else {
            return false;
        };
        let Some(node_b) = self.name_to_index.get(step_b) else {
            return false;
        };

        petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    fn edges_by_name(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()], e.source(), e.target()))
            .collect();
        edges.sort_by_key(|(from, to, _, _)| (*to, *from));

        edges
            .into_iter()
            .map(|(_, _, from, to)| {
                (
                    self.index_to_name[&from].as_str(),
                    self.index_to_name[&to].as_str(),
                )
            })
            .collect()
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> Result<String, PushflowError> {
        let mut out = String::from("graph TD\n");

        for name in self.execution_order_names()? {
            out.push_str(&format!("    {}[{}]\n", name, name));
        }

        for (from, to) in self.edges_by_name() {
            out.push_str(&format!("    {} --> {}\n", from, to));
        }

        Ok(out)
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to) in self.edges_by_name() {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        for (node, name) in &self.index_to_name {
            if self.graph.neighbors_undirected(*node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", name));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, steps: &[Step]) -> Result<String, PushflowError> {
        let mut out = String::new();

        for (i, idx) in self.execution_order()?.iter().enumerate() {
            let step = &steps[*idx];
            let deps = self.dependencies(&step.name).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, step.name, step.tool_name()));

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ImageSpec, Pipeline, StepAction};

    fn make_steps(steps: Vec<(&str, Vec<&str>)>) -> Vec<Step> {
        steps
            .into_iter()
            .map(|(name, deps)| Step {
                name: name.into(),
                action: StepAction::BuildPush(ImageSpec::new(name, "-x", "Dockerfile")),
                depends_on: deps.into_iter().map(String::from).collect(),
            })
            .collect()
    }

    #[test]
    fn test_langflow_order() {
        let steps = Pipeline::default().steps();
        let dag = StepGraph::build(&steps).unwrap();
        assert_eq!(
            dag.execution_order_names().unwrap(),
            vec!["checkout", "login", "build-base", "build-backend", "build-frontend"]
        );
        assert!(dag.depends_on("build-frontend", "build-base"));
        assert!(dag.depends_on("build-backend", "checkout"));
        assert!(!dag.depends_on("build-frontend", "build-backend"));
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        // "late" is declared before "early" but depends on nothing either
        let steps = make_steps(vec![("root", vec![]), ("late", vec!["root"]), ("early", vec!["root"])]);
        let dag = StepGraph::build(&steps).unwrap();
        assert_eq!(dag.execution_order_names().unwrap(), vec!["root", "late", "early"]);
    }

    #[test]
    fn test_dependency_declared_later_runs_first() {
        let steps = make_steps(vec![("child", vec!["parent"]), ("parent", vec![])]);
        let dag = StepGraph::build(&steps).unwrap();
        assert_eq!(dag.execution_order().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let steps = make_steps(vec![("a", vec!["b"]), ("b", vec!["a"])]);
        match StepGraph::build(&steps) {
            Err(PushflowError::CircularDependency { steps }) => {
                assert!(steps.contains(&"a".to_string()));
                assert!(steps.contains(&"b".to_string()));
            }
            _ => panic!("Expected CircularDependency"),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let steps = make_steps(vec![("a", vec!["nonexistent"])]);
        let result = StepGraph::build(&steps);
        assert!(matches!(result, Err(PushflowError::UnknownDependency { .. })));
    }

    #[test]
    fn test_text_output() {
        let steps = Pipeline::default().steps();
        let dag = StepGraph::build(&steps).unwrap();
        let text = dag.to_text(&steps).unwrap();
        assert!(text.starts_with("1. checkout (git)\n"));
        assert!(text.contains("4. build-backend (docker) [depends: login, build-base]"));
    }

    #[test]
    fn test_mermaid_output() {
        let steps = Pipeline::default().steps();
        let dag = StepGraph::build(&steps).unwrap();
        let mermaid = dag.to_mermaid().unwrap();
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("build-base --> build-frontend"));
    }
}
