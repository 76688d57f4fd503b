//! Dependency graph over config items.
//!
//! Nodes are config item names. An edge `a -> b` means item `a` reads item
//! `b`, so `b` must be resolved first. Edges are discovered by rendering
//! each item's templates with the recording providers, not by parsing them.
//!
//! Certificates get special treatment: an item calling `TLSKey "web"`
//! depends on every item calling `TLSCert "web"`, even though neither
//! mentions the other by name. [`DepGraph::resolve_cert_keys`] turns those
//! relationships into ordinary edges.
//!
//! The graph is consumed by the resolution protocol: the driver repeatedly
//! takes the [head nodes](DepGraph::get_head_nodes), computes them and calls
//! [`DepGraph::resolve_dep`] until the graph is empty. Cloning the graph
//! yields an independent copy for inspection.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ConfigGroup;
use crate::templating::{
    Builder, Delimiters, IdentityCtx, KurlCtx, LicenseCtx, RecordingCtx, StaticCtx, VersionCtx,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Nodes remain but none of them is free of dependencies.
    #[error(
        "No more indep config items can be resolved; possible loop: {}",
        format_waiting(.waiting)
    )]
    DependencyLoop {
        /// Each stuck node with the nodes it is waiting on.
        waiting: Vec<(String, Vec<String>)>,
    },

    /// A cycle found while computing a topological order.
    #[error("Circular dependency detected: {}", join_path(.path))]
    Cycle {
        path: Vec<String>,
    },
}

fn join_path(path: &[String]) -> String {
    path.join(" → ")
}

fn format_waiting(waiting: &[(String, Vec<String>)]) -> String {
    waiting
        .iter()
        .map(|(node, deps)| {
            let deps = deps.iter().map(|d| format!("{d:?}")).collect::<Vec<_>>().join(", ");
            format!("{node:?} depends on {deps}")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Dependency graph for one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepGraph {
    /// Node to the nodes it still waits on.
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Certificate name to the nodes producing it.
    cert_items: BTreeMap<String, BTreeSet<String>>,
    /// Node to the certificate names whose key it consumes.
    key_items: BTreeMap<String, BTreeSet<String>>,
    /// Nodes in the order they were resolved.
    resolved: Vec<String>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it doesn't already exist.
    pub fn add_node(&mut self, name: &str) {
        self.dependencies.entry(name.to_string()).or_default();
    }

    /// Record that `source` depends on `target`. Both become nodes.
    pub fn add_dep(&mut self, source: &str, target: &str) {
        self.add_node(target);
        self.dependencies.entry(source.to_string()).or_default().insert(target.to_string());
    }

    /// Record that `node` produces the certificate `cert`.
    pub fn add_cert_producer(&mut self, cert: &str, node: &str) {
        self.add_node(node);
        self.cert_items.entry(cert.to_string()).or_default().insert(node.to_string());
    }

    /// Record that `node` consumes the key of certificate `cert`.
    pub fn add_key_consumer(&mut self, node: &str, cert: &str) {
        self.add_node(node);
        self.key_items.entry(node.to_string()).or_default().insert(cert.to_string());
    }

    /// Build the graph from config groups by rendering every item's default
    /// and value with recording functions.
    ///
    /// Render errors are expected here, since only placeholders are
    /// available, and are discarded. References to names that are not
    /// items add no edge. An item reading itself is a one-node loop.
    pub fn parse_config_group(&mut self, groups: &[ConfigGroup]) {
        let items: BTreeSet<&str> =
            groups.iter().flat_map(|g| g.items.iter().map(|i| i.name.as_str())).collect();

        let recorder = RecordingCtx::new();
        let builder = Builder::new()
            .with_ctx(StaticCtx::new())
            .with_ctx(LicenseCtx::default())
            .with_ctx(VersionCtx::default())
            .with_ctx(IdentityCtx::default())
            .with_ctx(KurlCtx::default())
            .with_ctx(recorder.clone());

        for item in groups.iter().flat_map(|g| &g.items) {
            self.add_node(&item.name);

            for text in [&item.default, &item.value] {
                // Each pass sees the raw text so a failure in one pass does
                // not hide the references in the other.
                for delims in Delimiters::PASSES {
                    if let Err(e) = builder.render_pass(delims, &item.name, text) {
                        tracing::debug!("Ignoring render error while recording '{}': {}", item.name, e);
                    }
                }
            }

            let recording = recorder.take();
            for target in &recording.items {
                if items.contains(target.as_str()) {
                    self.add_dep(&item.name, target);
                } else {
                    tracing::debug!("'{}' references unknown item '{}'", item.name, target);
                }
            }
            for cert in &recording.certs_produced {
                self.add_cert_producer(cert, &item.name);
            }
            for cert in &recording.keys_consumed {
                self.add_key_consumer(&item.name, cert);
            }
        }

        self.resolve_cert_keys();
    }

    /// Make every key consumer depend on every producer of that certificate.
    pub fn resolve_cert_keys(&mut self) {
        let mut edges = Vec::new();
        for (node, certs) in &self.key_items {
            for cert in certs {
                for producer in self.cert_items.get(cert).into_iter().flatten() {
                    if producer != node {
                        edges.push((node.clone(), producer.clone()));
                    }
                }
            }
        }
        for (node, producer) in edges {
            self.add_dep(&node, &producer);
        }
    }

    /// Nodes with no unresolved dependencies, sorted by name.
    ///
    /// # Errors
    ///
    /// [`GraphError::DependencyLoop`] when nodes remain but every one of
    /// them is waiting on another.
    pub fn get_head_nodes(&self) -> Result<Vec<String>, GraphError> {
        let heads: Vec<String> = self
            .dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| name.clone())
            .collect();

        if heads.is_empty() && !self.dependencies.is_empty() {
            let waiting = self
                .dependencies
                .iter()
                .map(|(node, deps)| (node.clone(), deps.iter().cloned().collect()))
                .collect();
            return Err(GraphError::DependencyLoop {
                waiting,
            });
        }
        Ok(heads)
    }

    /// Remove `name` as a node and from every dependency set.
    ///
    /// Returns false if `name` was not a node.
    pub fn resolve_dep(&mut self, name: &str) -> bool {
        if self.dependencies.remove(name).is_none() {
            return false;
        }
        for deps in self.dependencies.values_mut() {
            deps.remove(name);
        }
        self.resolved.push(name.to_string());
        true
    }

    /// Nodes in the order they were resolved.
    pub fn resolved(&self) -> &[String] {
        &self.resolved
    }

    /// Remaining dependencies of `name`.
    pub fn dependencies_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Number of unresolved nodes.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Run the resolution protocol on a copy and return each round of heads.
    pub fn evaluation_waves(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut graph = self.clone();
        let mut waves = Vec::new();
        loop {
            let heads = graph.get_head_nodes()?;
            if heads.is_empty() {
                return Ok(waves);
            }
            for head in &heads {
                graph.resolve_dep(head);
            }
            waves.push(heads);
        }
    }

    fn to_petgraph(&self) -> DiGraph<String, ()> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        for name in self.dependencies.keys() {
            node_map.insert(name.as_str(), graph.add_node(name.clone()));
        }
        for (name, deps) in &self.dependencies {
            for dep in deps {
                if let (Some(&from), Some(&to)) = (node_map.get(name.as_str()), node_map.get(dep.as_str()))
                    && !graph.contains_edge(from, to)
                {
                    graph.add_edge(from, to, ());
                }
            }
        }
        graph
    }

    /// All nodes with dependencies before their dependents.
    ///
    /// # Errors
    ///
    /// [`GraphError::Cycle`] with one closed path such as `a → b → a`.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let graph = self.to_petgraph();
        match toposort(&graph, None) {
            Ok(indices) => Ok(indices.into_iter().rev().map(|idx| graph[idx].clone()).collect()),
            Err(cycle) => Err(GraphError::Cycle {
                path: cycle_path(&graph, cycle.node_id()),
            }),
        }
    }
}

/// Closed path through the strongly connected component holding `member`.
///
/// Starts at the smallest name in the component and always steps to the
/// smallest neighbour inside it, so the reported path is stable.
fn cycle_path(graph: &DiGraph<String, ()>, member: NodeIndex) -> Vec<String> {
    let component: HashSet<NodeIndex> = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.contains(&member))
        .unwrap_or_else(|| vec![member])
        .into_iter()
        .collect();
    let by_name = |a: &NodeIndex, b: &NodeIndex| graph[*a].cmp(&graph[*b]);

    let mut current = component.iter().copied().min_by(by_name).unwrap_or(member);
    let mut path: Vec<NodeIndex> = Vec::new();
    loop {
        if let Some(start) = path.iter().position(|n| *n == current) {
            let mut cycle: Vec<String> = path[start..].iter().map(|n| graph[*n].clone()).collect();
            cycle.push(graph[current].clone());
            return cycle;
        }
        path.push(current);
        match graph.neighbors(current).filter(|n| component.contains(n)).min_by(by_name) {
            Some(next) => current = next,
            None => return path.iter().map(|n| graph[*n].clone()).collect(),
        }
    }
}
