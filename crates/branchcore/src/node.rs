use crate::{events::EventEmitter, EvalError, ExecutionId, NodeError, NodeId, RoutingMode, Value, WorkflowId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Core trait that all executable nodes implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique type identifier (e.g., "condition", "transform.json_parse")
    fn node_type(&self) -> &str;

    /// Execute the node with given context
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;

    /// Optional: Validate configuration at workflow load time
    fn validate_config(&self, _config: &BTreeMap<String, Value>) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Resolves `namespace.field` references for the node being executed.
pub trait VariableSource: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<Value, EvalError>;
}

/// Per-run values reachable through the reserved namespaces.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub input: Value,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(workflow_id: WorkflowId, input: Value) -> Self {
        Self {
            execution_id: ExecutionId::new_v4(),
            workflow_id,
            input,
            started_at: Utc::now(),
        }
    }
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    /// Namespace under which other nodes reference this node's outputs
    pub display_name: String,

    /// Input values from connected nodes
    pub inputs: HashMap<String, Value>,

    /// Static configuration for this node
    pub config: BTreeMap<String, Value>,

    /// Variables visible from this node
    pub variables: Arc<dyn VariableSource>,

    /// Routing policy inherited from the workflow settings
    pub routing: RoutingMode,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancellation token for graceful shutdown
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl NodeContext {
    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }
}

/// Output from node execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Output field values
    pub outputs: BTreeMap<String, Value>,

    /// Path id chosen by a routing node; only edges whose source handle
    /// matches stay active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(field.into(), value.into());
        self
    }

    pub fn with_outputs(mut self, outputs: BTreeMap<String, Value>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn with_branch(mut self, path_id: impl Into<String>) -> Self {
        self.branch = Some(path_id.into());
        self
    }
}
