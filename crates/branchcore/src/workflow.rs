use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = String;

/// Names resolved against the run context instead of a node.
pub const RESERVED_NAMESPACES: [&str; 3] = ["input", "now", "run"];

/// Complete workflow definition as authored in the editor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Plain dependency edge.
    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.edges.push(Edge::new(source, target));
    }

    /// Edge leaving a Condition node, active only when `path_id` is taken.
    pub fn connect_branch(
        &mut self,
        source: impl Into<NodeId>,
        path_id: impl Into<String>,
        target: impl Into<NodeId>,
    ) {
        self.edges
            .push(Edge::new(source, target).with_source_handle(path_id));
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Node specification in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            display_name: None,
            config: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_config_map(mut self, config: BTreeMap<String, Value>) -> Self {
        self.config.extend(config);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Directed edge between nodes.
///
/// On edges leaving a Condition node `source_handle` names the path that
/// activates the edge. Elsewhere, when both handles are set, the source's
/// output field `source_handle` is passed to the target as input
/// `target_handle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }
}

/// Global workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowSettings {
    pub max_execution_time_ms: Option<u64>,
    pub on_error: ErrorHandling,
    pub routing: RoutingMode,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_execution_time_ms: None,
            on_error: ErrorHandling::StopWorkflow,
            routing: RoutingMode::Strict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorHandling {
    StopWorkflow,
    ContinueOnError,
}

/// What a Condition node does when a clause fails to resolve or evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// The routing decision fails and the run halts.
    #[default]
    Strict,
    /// The owning path is treated as not matched.
    Lenient,
}
