//! Variable resolution: `namespace.field` to a runtime [`Value`].
//!
//! A [`SymbolTable`] binds every namespace visible from one node (the display
//! names and ids of its transitive upstream nodes) to the node it denotes.
//! Lookups then read that node's entry in the [`OutputStore`]. The reserved
//! namespaces `input`, `now` and `run` resolve against the [`RunContext`].

use crate::graph::ExecutionGraph;
use branchcore::{EvalError, NodeId, RunContext, Value, VariableSource, RESERVED_NAMESPACES};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Outputs of every node that has executed in the current run.
pub type OutputStore = HashMap<NodeId, BTreeMap<String, Value>>;

#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Node(NodeId),
    Ambiguous(Vec<NodeId>),
}

/// Namespaces visible from one node.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    bindings: HashMap<String, Binding>,
}

impl SymbolTable {
    /// Bind the upstream nodes of `current`. Display names take precedence
    /// over raw ids; a display name shared by two upstream nodes stays
    /// ambiguous.
    pub fn for_node(graph: &ExecutionGraph, current: &str) -> Self {
        let ancestors = graph.ancestors(current);
        let mut bindings: HashMap<String, Binding> = HashMap::new();

        for id in &ancestors {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let next = match bindings.remove(&node.display_name) {
                None => Binding::Node(id.clone()),
                Some(Binding::Node(existing)) => {
                    let mut nodes = vec![existing, id.clone()];
                    nodes.sort();
                    Binding::Ambiguous(nodes)
                }
                Some(Binding::Ambiguous(mut nodes)) => {
                    nodes.push(id.clone());
                    nodes.sort();
                    Binding::Ambiguous(nodes)
                }
            };
            bindings.insert(node.display_name.clone(), next);
        }
        for id in ancestors {
            bindings.entry(id.clone()).or_insert(Binding::Node(id));
        }

        Self { bindings }
    }

    fn lookup(&self, namespace: &str) -> Option<&Binding> {
        self.bindings.get(namespace)
    }
}

/// Split a reference on its first dot.
pub fn split_reference(reference: &str) -> (&str, &str) {
    let reference = reference.trim();
    match reference.split_once('.') {
        Some((namespace, field)) => (namespace.trim(), field.trim()),
        None => (reference, ""),
    }
}

pub fn is_reserved(namespace: &str) -> bool {
    RESERVED_NAMESPACES.contains(&namespace)
}

/// Resolve `reference` as seen from `current`.
pub fn resolve(
    reference: &str,
    current: &str,
    graph: &ExecutionGraph,
    outputs: &OutputStore,
    run: &RunContext,
) -> Result<Value, EvalError> {
    let table = SymbolTable::for_node(graph, current);
    resolve_in(reference, &table, outputs, run)
}

/// Resolve `reference` against a prepared symbol table.
pub fn resolve_in(
    reference: &str,
    table: &SymbolTable,
    outputs: &OutputStore,
    run: &RunContext,
) -> Result<Value, EvalError> {
    let (namespace, field_path) = split_reference(reference);
    if namespace.is_empty() {
        return Err(EvalError::UnknownVariable {
            reference: reference.to_string(),
        });
    }

    if is_reserved(namespace) {
        return Ok(resolve_reserved(namespace, field_path, run));
    }

    let node_id = match table.lookup(namespace) {
        None => {
            return Err(EvalError::UnknownVariable {
                reference: reference.trim().to_string(),
            })
        }
        Some(Binding::Ambiguous(nodes)) => {
            return Err(EvalError::AmbiguousNamespace {
                namespace: namespace.to_string(),
                nodes: nodes.clone(),
            })
        }
        Some(Binding::Node(id)) => id,
    };

    let node_outputs = outputs
        .get(node_id)
        .ok_or_else(|| EvalError::NotYetComputed {
            namespace: namespace.to_string(),
            node_id: node_id.clone(),
        })?;

    let value = if field_path.is_empty() {
        Value::Object(node_outputs.clone())
    } else {
        let (head, rest) = match field_path.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (field_path, ""),
        };
        node_outputs
            .get(head)
            .map(|v| v.get_path(rest))
            .unwrap_or(Value::Null)
    };
    tracing::debug!(reference, node_id = %node_id, "resolved variable");
    Ok(value)
}

fn resolve_reserved(namespace: &str, field_path: &str, run: &RunContext) -> Value {
    match namespace {
        "input" => run.input.get_path(field_path),
        "now" => match field_path {
            "" => Value::Text(run.started_at.to_rfc3339()),
            "date" => Value::Text(run.started_at.format("%Y-%m-%d").to_string()),
            "timestamp" => Value::Number(run.started_at.timestamp() as f64),
            _ => Value::Null,
        },
        "run" => {
            let mut record = BTreeMap::new();
            record.insert("id".to_string(), Value::Text(run.execution_id.to_string()));
            record.insert(
                "workflowId".to_string(),
                Value::Text(run.workflow_id.to_string()),
            );
            Value::Object(record).get_path(field_path)
        }
        _ => Value::Null,
    }
}

/// Variables visible from one node during a run.
///
/// Holds a snapshot of the outputs computed before the node started, so a
/// scope never observes writes made after it was created.
#[derive(Clone)]
pub struct NodeScope {
    table: SymbolTable,
    outputs: Arc<OutputStore>,
    run: Arc<RunContext>,
}

impl NodeScope {
    pub fn new(
        graph: &ExecutionGraph,
        current: &str,
        outputs: Arc<OutputStore>,
        run: Arc<RunContext>,
    ) -> Self {
        Self {
            table: SymbolTable::for_node(graph, current),
            outputs,
            run,
        }
    }
}

impl VariableSource for NodeScope {
    fn resolve(&self, reference: &str) -> Result<Value, EvalError> {
        resolve_in(reference, &self.table, &self.outputs, &self.run)
    }
}

/// Flat variable map, handy where no graph is involved.
///
/// Keys are full references (`"a.b"`) or namespaces whose value is navigated
/// by the remaining field path.
#[derive(Debug, Clone, Default)]
pub struct StaticVariables {
    values: HashMap<String, Value>,
}

impl StaticVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl VariableSource for StaticVariables {
    fn resolve(&self, reference: &str) -> Result<Value, EvalError> {
        let reference = reference.trim();
        if let Some(value) = self.values.get(reference) {
            return Ok(value.clone());
        }
        let (namespace, field_path) = split_reference(reference);
        self.values
            .get(namespace)
            .map(|v| v.get_path(field_path))
            .ok_or_else(|| EvalError::UnknownVariable {
                reference: reference.to_string(),
            })
    }
}
