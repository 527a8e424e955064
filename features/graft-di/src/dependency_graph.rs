use std::{
    collections::{BTreeSet, HashSet},
    fmt::Write,
    sync::Arc,
};

use crate::{
    binding::{Binding, BindingInfo},
    errors::{GraphError, GraphErrors},
};

/// Graph over a set of resolved bindings
///
/// Used to check for dependency cycles and unused bindings, and to render the graph.
pub struct DependencyGraph {
    bindings: Vec<Arc<dyn Binding>>,
}

impl DependencyGraph {
    /// Bindings installed under several keys are only added once
    pub fn new<'a>(bindings: impl IntoIterator<Item = &'a Arc<dyn Binding>>) -> Self {
        let mut seen = HashSet::new();
        let bindings = bindings
            .into_iter()
            .filter(|binding| seen.insert(identity(binding.info())))
            .cloned()
            .collect();
        Self { bindings }
    }

    /// Reports every dependency cycle reachable from the graph
    ///
    /// Bindings proven cycle free are marked and skipped by later checks, bindings on a cycle
    /// are checked again every time.
    pub fn detect_cycles(&self) -> Result<(), GraphErrors> {
        let mut reported = HashSet::new();
        let mut errors = Vec::new();
        for binding in &self.bindings {
            let mut path = Vec::new();
            check_recurse(binding, &mut path, &mut reported, &mut errors);
        }

        return GraphErrors::into_result(errors);

        /// Returns whether the subtree is free of cycles, including ones reported earlier
        fn check_recurse(
            binding: &Arc<dyn Binding>,
            path: &mut Vec<Arc<dyn Binding>>,
            reported: &mut HashSet<BTreeSet<String>>,
            errors: &mut Vec<GraphError>,
        ) -> bool {
            let info = binding.info();
            if info.is_cycle_free() {
                return true;
            }

            if info.is_visiting() {
                let start = path
                    .iter()
                    .position(|entry| identity(entry.info()) == identity(info))
                    .unwrap_or(0);
                let cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|entry| entry.info().to_string())
                    .collect();
                // The same cycle is found again from each of its members
                if reported.insert(cycle.iter().cloned().collect()) {
                    errors.push(GraphError::Cycle { path: cycle });
                }
                return false;
            }

            info.set_visiting(true);
            path.push(binding.clone());

            let mut dependencies = Vec::new();
            binding.dependencies(&mut dependencies);
            let mut cycle_free = true;
            for dependency in &dependencies {
                cycle_free &= check_recurse(dependency, path, reported, errors);
            }

            path.pop();
            info.set_visiting(false);
            if cycle_free {
                info.set_cycle_free(true);
            }
            cycle_free
        }
    }

    /// Reports bindings that are neither library bindings nor depended on
    pub fn detect_unused_bindings(&self) -> Result<(), GraphErrors> {
        let errors = self
            .bindings
            .iter()
            .map(|binding| binding.info())
            .filter(|info| !info.is_library() && !info.is_depended_on())
            .map(|info| GraphError::Unused {
                key: info.to_string(),
                declared_by: info.required_by().to_string(),
            })
            .collect();
        GraphErrors::into_result(errors)
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), GraphErrors> {
        let mut errors = Vec::new();
        if let Err(cycles) = self.detect_cycles() {
            errors.extend(cycles.errors);
        }
        if let Err(unused) = self.detect_unused_bindings() {
            errors.extend(unused.errors);
        }
        GraphErrors::into_result(errors)
    }

    /// Renders the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        let mut edges = BTreeSet::new();
        let mut nodes = BTreeSet::new();
        for binding in &self.bindings {
            let from = binding.info().to_string();
            let mut dependencies = Vec::new();
            binding.dependencies(&mut dependencies);
            for dependency in dependencies {
                edges.insert((from.clone(), dependency.info().to_string()));
            }
            nodes.insert(from);
        }

        let mut dot = String::from("digraph G {\n");
        for node in &nodes {
            let _ = writeln!(dot, "  {node:?};");
        }
        for (from, to) in &edges {
            let _ = writeln!(dot, "  {from:?} -> {to:?};");
        }
        dot.push_str("}\n");
        dot
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Scoped bindings share the info of the binding they wrap
fn identity(info: &BindingInfo) -> *const BindingInfo {
    info
}
