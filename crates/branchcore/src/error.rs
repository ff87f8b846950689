use crate::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Routing failed at node '{node_id}': {source}")]
    Routing {
        node_id: NodeId,
        #[source]
        source: EvalError,
    },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Workflow run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Resolution and evaluation errors raised while a run is in progress.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unknown variable: '{reference}'")]
    UnknownVariable { reference: String },

    #[error("Variable namespace '{namespace}' refers to node '{node_id}' which has not produced outputs yet")]
    NotYetComputed { namespace: String, node_id: NodeId },

    #[error("Variable namespace '{namespace}' is ambiguous, matches nodes {nodes:?}")]
    AmbiguousNamespace { namespace: String, nodes: Vec<NodeId> },

    #[error("Operator '{operator}' expects {expected}, got {found}")]
    TypeMismatch {
        operator: String,
        expected: String,
        found: String,
    },

    #[error("Invalid operand '{operand}' for operator '{operator}': {reason}")]
    InvalidOperand {
        operator: String,
        operand: String,
        reason: String,
    },

    #[error("Condition node has no paths")]
    NoPaths,
}

#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Evaluation(#[from] EvalError),

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,
}

/// Configuration errors. These are detected before a run starts and are
/// always fatal.
#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Cyclic dependency detected")]
    CyclicDependency,

    #[error("Reference cycle between nodes {nodes:?}")]
    ReferenceCycle { nodes: Vec<NodeId> },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Display name '{name}' is used by several nodes: {nodes:?}")]
    DuplicateDisplayName { name: String, nodes: Vec<NodeId> },

    #[error("Display name '{0}' is reserved")]
    ReservedDisplayName(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Invalid condition on node '{node_id}': {reason}")]
    InvalidCondition { node_id: NodeId, reason: String },

    #[error("Clause '{clause_id}' is invalid: {source}")]
    InvalidClause {
        clause_id: String,
        #[source]
        source: EvalError,
    },

    #[error("Edge from condition node '{node_id}' names unknown path '{handle}'")]
    UnknownBranchHandle { node_id: NodeId, handle: String },

    #[error("Clause '{clause_id}' uses operator '{operator}' but has no value")]
    MissingClauseValue { clause_id: String, operator: String },

    #[error("Clause '{clause_id}' has a malformed regex '{pattern}': {reason}")]
    InvalidRegex {
        clause_id: String,
        pattern: String,
        reason: String,
    },

    #[error("Clause '{clause_id}' has a malformed date '{value}'")]
    InvalidDate { clause_id: String, value: String },

    #[error("Clause '{clause_id}' has a malformed operand for '{operator}': {reason}")]
    MalformedOperand {
        clause_id: String,
        operator: String,
        reason: String,
    },
}
