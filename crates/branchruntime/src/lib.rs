//! Workflow execution runtime
//!
//! This crate resolves variables, evaluates condition clauses, selects
//! branches and runs workflows over their execution graph.

pub mod evaluator;
mod executor;
mod graph;
mod registry;
pub mod resolve;
mod runtime;
mod schema;
pub mod select;
pub mod template;
pub mod validate;

pub use evaluator::{apply_operator, evaluate};
pub use executor::{ExecutionResult, WorkflowExecutor};
pub use graph::{ExecutionGraph, GraphNode};
pub use registry::{NodeFactory, NodeMetadata, NodeRegistry, PortDefinition};
pub use resolve::{resolve, NodeScope, OutputStore, StaticVariables, SymbolTable};
pub use runtime::{BranchRuntime, RuntimeConfig};
pub use schema::{OutputSchema, SchemaRegistry};
pub use select::{evaluate_path, select_path, select_path_reporting};
pub use template::{extract_references, interpolate, resolve_operand};
pub use validate::{validate, ValidationReport};
