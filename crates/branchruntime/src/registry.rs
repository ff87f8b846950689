use branchcore::{Node, NodeError, NodeSpec, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Create a new instance of the node for the given spec
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError>;

    /// Get node type identifier
    fn node_type(&self) -> &str;

    /// Description and declared output fields, used to build output schemas
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
///
/// An empty `outputs` list means the fields are only known after the node
/// runs, and references into it are not checked before the run.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
    pub outputs: Vec<PortDefinition>,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            outputs: Vec::new(),
        }
    }
}

/// A named output field a node publishes.
#[derive(Debug, Clone)]
pub struct PortDefinition {
    pub name: String,
    pub description: String,
}

impl PortDefinition {
    pub fn output(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Registry of available node types
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a node factory
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::debug!(node_type = %node_type, "registering node type");
        if self.factories.insert(node_type.clone(), factory).is_some() {
            tracing::warn!("Node type '{}' registered twice, keeping the last factory", node_type);
        }
    }

    /// Create a node instance from its spec
    pub fn create_node(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, WorkflowError> {
        let factory = self
            .factories
            .get(&spec.node_type)
            .ok_or_else(|| WorkflowError::UnknownNodeType(spec.node_type.clone()))?;

        factory.create(spec).map_err(|e| {
            WorkflowError::Invalid(format!("Failed to create node '{}': {}", spec.id, e))
        })
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<NodeMetadata> {
        self.factories.get(node_type).map(|f| f.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
