//! Core abstractions for the condition routing engine
//!
//! This crate provides the data model (workflows, nodes, edges, condition
//! paths and clauses), the dynamic `Value` type, error types and the node
//! trait that all other crates build on. It has no runtime dependencies.

pub mod condition;
mod error;
pub mod events;
mod node;
mod value;
mod workflow;

pub use condition::{
    condition_config, Clause, ConditionConfig, LogicalOperator, OperatorKind, Path, Selection,
    CONDITION_NODE_TYPE,
};
pub use error::{EvalError, FlowError, NodeError, WorkflowError};
pub use events::*;
pub use node::{Node, NodeContext, NodeOutput, RunContext, VariableSource};
pub use value::{format_number, Value};
pub use workflow::{
    Edge, ErrorHandling, NodeId, NodeSpec, RoutingMode, Workflow, WorkflowId, WorkflowSettings,
    RESERVED_NAMESPACES,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
