use crate::schema::SchemaRegistry;
use branchcore::{Edge, NodeId, NodeSpec, Workflow, WorkflowError};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::{HashMap, HashSet};

/// A workflow node together with the namespace it is addressed by.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub spec: NodeSpec,
    pub display_name: String,
}

/// Nodes and directed edges of one workflow run, in topological order.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    graph: DiGraph<NodeId, ()>,
    node_to_index: HashMap<NodeId, NodeIndex>,
    nodes: HashMap<NodeId, GraphNode>,
    edges: Vec<Edge>,
    order: Vec<NodeId>,
}

impl ExecutionGraph {
    /// Build the dependency graph from the workflow.
    ///
    /// Fails on duplicate ids, edges to unknown nodes, and cycles.
    pub fn build(workflow: &Workflow) -> Result<Self, WorkflowError> {
        let mut graph = DiGraph::new();
        let mut node_to_index = HashMap::new();
        let mut nodes = HashMap::new();
        let mut per_type: HashMap<&str, usize> = HashMap::new();

        for spec in &workflow.nodes {
            if node_to_index.contains_key(&spec.id) {
                return Err(WorkflowError::DuplicateNodeId(spec.id.clone()));
            }
            let ordinal = per_type.entry(spec.node_type.as_str()).or_insert(0);
            let display_name = match &spec.display_name {
                Some(name) if !name.trim().is_empty() => name.trim().to_string(),
                _ => format!("{}_{}", slugify(&spec.node_type), ordinal),
            };
            *ordinal += 1;

            let idx = graph.add_node(spec.id.clone());
            node_to_index.insert(spec.id.clone(), idx);
            nodes.insert(
                spec.id.clone(),
                GraphNode {
                    spec: spec.clone(),
                    display_name,
                },
            );
        }

        for edge in &workflow.edges {
            let from_idx = node_to_index
                .get(&edge.source)
                .ok_or_else(|| WorkflowError::NodeNotFound(edge.source.clone()))?;
            let to_idx = node_to_index
                .get(&edge.target)
                .ok_or_else(|| WorkflowError::NodeNotFound(edge.target.clone()))?;
            if from_idx == to_idx {
                return Err(WorkflowError::InvalidConnection(format!(
                    "node '{}' is connected to itself",
                    edge.source
                )));
            }
            graph.add_edge(*from_idx, *to_idx, ());
        }

        let order = toposort(&graph, None)
            .map_err(|_| WorkflowError::CyclicDependency)?
            .into_iter()
            .map(|idx| graph[idx].clone())
            .collect();

        Ok(Self {
            graph,
            node_to_index,
            nodes,
            edges: workflow.edges.clone(),
            order,
        })
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Direct predecessors of a node.
    pub fn upstream(&self, id: &str) -> Vec<NodeId> {
        let Some(idx) = self.node_to_index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<NodeId> = self
            .graph
            .neighbors_directed(*idx, petgraph::Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Every node the given node transitively depends on, in topological order.
    pub fn ancestors(&self, id: &str) -> Vec<NodeId> {
        let Some(start) = self.node_to_index.get(id) else {
            return Vec::new();
        };
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, *start);
        let mut seen = HashSet::new();
        while let Some(idx) = dfs.next(reversed) {
            if idx != *start {
                seen.insert(self.graph[idx].clone());
            }
        }
        self.order
            .iter()
            .filter(|id| seen.contains(*id))
            .cloned()
            .collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// References a node can use, derived from its upstream nodes' declared
    /// output fields. This is the editor's suggestion list; resolution never
    /// consults it.
    pub fn available_variables(&self, id: &str, schemas: &SchemaRegistry) -> Vec<String> {
        let mut vars = vec!["input".to_string(), "now".to_string()];
        for ancestor in self.ancestors(id) {
            let Some(node) = self.nodes.get(&ancestor) else {
                continue;
            };
            match schemas.fields_for(&node.spec) {
                Some(fields) => vars.extend(
                    fields
                        .into_iter()
                        .map(|field| format!("{}.{}", node.display_name, field)),
                ),
                None => vars.push(node.display_name.clone()),
            }
        }
        vars
    }
}

fn slugify(node_type: &str) -> String {
    node_type
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
