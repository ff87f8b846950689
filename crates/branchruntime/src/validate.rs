//! Pre-run configuration checks.
//!
//! Everything here is fatal except what ends up in
//! [`ValidationReport::warnings`].

use crate::evaluator::{compare_dates, parse_date, parse_number, TYPE_NAMES};
use crate::graph::ExecutionGraph;
use crate::resolve::{is_reserved, split_reference};
use crate::schema::SchemaRegistry;
use crate::template::{extract_references, operand_references};
use branchcore::{
    Clause, ConditionConfig, NodeId, OperatorKind, Value, WorkflowError, CONDITION_NODE_TYPE,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Non-fatal findings of [`validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Check a built graph for every configuration error that would otherwise
/// surface mid-run.
pub fn validate(
    graph: &ExecutionGraph,
    schemas: &SchemaRegistry,
) -> Result<ValidationReport, WorkflowError> {
    let mut report = ValidationReport::default();

    check_display_names(graph)?;

    let mut references: Vec<(NodeId, String)> = Vec::new();
    for node in graph.nodes() {
        if node.spec.node_type == CONDITION_NODE_TYPE {
            let condition = ConditionConfig::from_config(&node.spec.id, &node.spec.config)?;
            check_branch_handles(graph, &node.spec.id, &condition)?;
            for path in condition.guarded_paths() {
                if path.clauses.is_empty() {
                    report.warn(format!(
                        "path '{}' on node '{}' has no clauses and always matches",
                        path.id, node.spec.id
                    ));
                }
                for clause in &path.clauses {
                    check_static_operand(clause)?;
                    for reference in clause_references(clause) {
                        references.push((node.spec.id.clone(), reference));
                    }
                }
            }
        } else {
            let mut found = Vec::new();
            for value in node.spec.config.values() {
                collect_template_references(value, &mut found);
            }
            references.extend(found.into_iter().map(|r| (node.spec.id.clone(), r)));
        }
    }

    let namespaces = namespace_table(graph);
    let mut dependencies: Vec<(NodeId, NodeId)> = Vec::new();
    for (node_id, reference) in &references {
        let (namespace, field_path) = split_reference(reference);
        if is_reserved(namespace) {
            continue;
        }
        let Some(target) = namespaces.get(namespace) else {
            report.warn(format!(
                "node '{}' references unknown namespace '{}'",
                node_id, namespace
            ));
            continue;
        };
        dependencies.push((target.clone(), node_id.clone()));

        if let Some(fields) = graph.node(target).and_then(|n| schemas.fields_for(&n.spec)) {
            let head = field_path.split('.').next().unwrap_or_default();
            if !head.is_empty() && !fields.iter().any(|f| f == head) {
                report.warn(format!(
                    "node '{}' references '{}', but '{}' produces no field '{}'",
                    node_id, reference, namespace, head
                ));
            }
        }
        if target != node_id && !graph.ancestors(node_id).contains(target) {
            report.warn(format!(
                "node '{}' references '{}', which is not upstream of it",
                node_id, namespace
            ));
        }
    }

    check_reference_cycles(graph, &dependencies)?;
    Ok(report)
}

/// Every handle on an edge leaving a Condition node must name one of its
/// paths, otherwise the target can never run.
fn check_branch_handles(
    graph: &ExecutionGraph,
    node_id: &str,
    condition: &ConditionConfig,
) -> Result<(), WorkflowError> {
    for edge in graph.outgoing_edges(node_id) {
        let Some(handle) = edge.source_handle.as_deref() else {
            continue;
        };
        if !condition.paths.iter().any(|p| p.id == handle) {
            return Err(WorkflowError::UnknownBranchHandle {
                node_id: node_id.to_string(),
                handle: handle.to_string(),
            });
        }
    }
    Ok(())
}

fn check_display_names(graph: &ExecutionGraph) -> Result<(), WorkflowError> {
    let mut by_name: BTreeMap<&str, Vec<NodeId>> = BTreeMap::new();
    for node in graph.nodes() {
        if is_reserved(&node.display_name) {
            return Err(WorkflowError::ReservedDisplayName(node.display_name.clone()));
        }
        by_name
            .entry(node.display_name.as_str())
            .or_default()
            .push(node.spec.id.clone());
    }
    for (name, mut nodes) in by_name {
        if nodes.len() > 1 {
            nodes.sort();
            return Err(WorkflowError::DuplicateDisplayName {
                name: name.to_string(),
                nodes,
            });
        }
    }
    Ok(())
}

/// Right-hand values without `{{` are known before the run, so malformed
/// ones are rejected here.
fn check_static_operand(clause: &Clause) -> Result<(), WorkflowError> {
    let Some(value) = clause.value.as_deref() else {
        return Ok(());
    };
    if value.contains("{{") {
        return Ok(());
    }
    let malformed = |reason: String| WorkflowError::MalformedOperand {
        clause_id: clause.id.clone(),
        operator: clause.operator.to_string(),
        reason,
    };
    let date = |text: &str| {
        parse_date(text).ok_or_else(|| WorkflowError::InvalidDate {
            clause_id: clause.id.clone(),
            value: text.trim().to_string(),
        })
    };

    match clause.operator {
        OperatorKind::MatchesRegex => {
            Regex::new(value).map_err(|e| WorkflowError::InvalidRegex {
                clause_id: clause.id.clone(),
                pattern: value.to_string(),
                reason: e.to_string(),
            })?;
        }
        OperatorKind::DateBefore | OperatorKind::DateAfter | OperatorKind::DateEquals => {
            date(value)?;
        }
        OperatorKind::DateBetween => {
            let bounds: Vec<&str> = value.split(',').collect();
            let [start, end] = bounds.as_slice() else {
                return Err(malformed(format!(
                    "expected two dates separated by ',', found {}",
                    bounds.len()
                )));
            };
            if compare_dates(&date(*start)?, &date(*end)?) == Ordering::Greater {
                return Err(malformed("start date is after end date".to_string()));
            }
        }
        OperatorKind::LengthEquals
        | OperatorKind::LengthGreaterThan
        | OperatorKind::LengthLessThan => {
            if parse_number(value).map_or(true, |n| n < 0.0) {
                return Err(malformed(format!("'{}' is not a non-negative number", value)));
            }
        }
        OperatorKind::TypeEquals => {
            let name = value.trim().to_ascii_lowercase();
            if !TYPE_NAMES.contains(&name.as_str()) {
                return Err(malformed(format!("unknown type name '{}'", value)));
            }
        }
        _ => {}
    }
    Ok(())
}

fn clause_references(clause: &Clause) -> Vec<String> {
    let mut refs = operand_references(&clause.input_field);
    if let Some(value) = &clause.value {
        refs.extend(extract_references(value));
    }
    refs
}

fn collect_template_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Text(text) => out.extend(extract_references(text)),
        Value::Array(items) => items.iter().for_each(|v| collect_template_references(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_template_references(v, out)),
        _ => {}
    }
}

/// Display names and ids of every node in the workflow.
fn namespace_table(graph: &ExecutionGraph) -> HashMap<String, NodeId> {
    let mut table = HashMap::new();
    for node in graph.nodes() {
        table.insert(node.display_name.clone(), node.spec.id.clone());
    }
    for node in graph.nodes() {
        table
            .entry(node.spec.id.clone())
            .or_insert_with(|| node.spec.id.clone());
    }
    table
}

/// Edges plus config references must still form a DAG.
fn check_reference_cycles(
    graph: &ExecutionGraph,
    dependencies: &[(NodeId, NodeId)],
) -> Result<(), WorkflowError> {
    let mut combined: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
    for id in graph.topological_order() {
        index.insert(id.clone(), combined.add_node(id.clone()));
    }

    let edges = graph
        .edges()
        .iter()
        .map(|e| (&e.source, &e.target))
        .chain(dependencies.iter().map(|(from, to)| (from, to)));
    for (from, to) in edges {
        if let (Some(a), Some(b)) = (index.get(from), index.get(to)) {
            combined.update_edge(*a, *b, ());
        }
    }

    for component in tarjan_scc(&combined) {
        let self_loop = component.len() == 1 && combined.contains_edge(component[0], component[0]);
        if component.len() > 1 || self_loop {
            let mut nodes: Vec<NodeId> = component.iter().map(|i| combined[*i].clone()).collect();
            nodes.sort();
            return Err(WorkflowError::ReferenceCycle { nodes });
        }
    }
    Ok(())
}
