use crate::graph::ExecutionGraph;
use crate::registry::NodeRegistry;
use crate::resolve::{NodeScope, OutputStore};
use crate::schema::SchemaRegistry;
use crate::validate::validate;
use branchcore::{
    Edge, ErrorHandling, EventBus, ExecutionEvent, ExecutionId, FlowError, Node, NodeContext,
    NodeError, NodeId, RunContext, Value, Workflow, CONDITION_NODE_TYPE,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Runs one workflow at a time, sequentially in topological order.
///
/// Nodes reached only through edges of untaken branches are skipped.
#[derive(Debug, Clone, Default)]
pub struct WorkflowExecutor;

impl WorkflowExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a workflow and return results
    pub async fn execute(
        &self,
        workflow: &Workflow,
        registry: &NodeRegistry,
        event_bus: &EventBus,
        input: Value,
        cancellation: CancellationToken,
    ) -> Result<ExecutionResult, FlowError> {
        let run = Arc::new(RunContext::new(workflow.id, input));
        let execution_id = run.execution_id;
        let start_time = Instant::now();

        event_bus.emit(ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow_id: workflow.id,
            timestamp: Utc::now(),
        });

        tracing::info!(
            workflow = %workflow.name,
            %execution_id,
            "Starting workflow execution"
        );

        let result = self
            .execute_graph(workflow, registry, event_bus, run, cancellation)
            .await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let success = result.is_ok();
        match &result {
            Ok(res) => tracing::info!(
                %execution_id,
                completed = res.completed_nodes,
                skipped = res.skipped_nodes.len(),
                duration_ms,
                "Workflow finished"
            ),
            Err(e) => tracing::error!(%execution_id, error = %e, "Workflow failed"),
        }

        event_bus.emit(ExecutionEvent::WorkflowCompleted {
            execution_id,
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    async fn execute_graph(
        &self,
        workflow: &Workflow,
        registry: &NodeRegistry,
        event_bus: &EventBus,
        run: Arc<RunContext>,
        cancellation: CancellationToken,
    ) -> Result<ExecutionResult, FlowError> {
        let execution_id = run.execution_id;
        let graph = ExecutionGraph::build(workflow)?;
        let schemas = SchemaRegistry::from_node_registry(registry);
        let report = validate(&graph, &schemas)?;
        if !report.is_clean() {
            tracing::debug!(warnings = report.warnings.len(), "Workflow validated with warnings");
        }

        let mut instances: HashMap<NodeId, Box<dyn Node>> = HashMap::new();
        for spec in &workflow.nodes {
            let node = registry.create_node(spec)?;
            node.validate_config(&spec.config)?;
            instances.insert(spec.id.clone(), node);
        }

        let mut outputs = OutputStore::new();
        let mut routes: BTreeMap<NodeId, String> = BTreeMap::new();
        let mut finished: HashSet<NodeId> = HashSet::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        let mut completed = 0usize;

        for node_id in graph.topological_order() {
            if cancellation.is_cancelled() {
                tracing::info!(%execution_id, next = %node_id, "Run cancelled");
                return Err(FlowError::Cancelled);
            }

            let Some(graph_node) = graph.node(node_id) else {
                continue;
            };
            let spec = &graph_node.spec;

            let incoming: Vec<&Edge> = graph.incoming_edges(node_id).collect();
            let active: Vec<&Edge> = incoming
                .iter()
                .copied()
                .filter(|edge| {
                    finished.contains(&edge.source) && edge_is_active(edge, routes.get(&edge.source))
                })
                .collect();

            if !incoming.is_empty() && active.is_empty() {
                tracing::info!(node_id = %node_id, "Skipping node on untaken branch");
                event_bus.emit(ExecutionEvent::NodeSkipped {
                    execution_id,
                    node_id: node_id.clone(),
                    timestamp: Utc::now(),
                });
                skipped.push(node_id.clone());
                continue;
            }

            let node = instances
                .remove(node_id)
                .ok_or_else(|| FlowError::Execution(format!("Node {} was not instantiated", node_id)))?;

            let inputs = if incoming.is_empty() {
                root_inputs(&run.input)
            } else {
                collect_node_inputs(&active, &outputs, &routes)
            };

            let scope = NodeScope::new(&graph, node_id, Arc::new(outputs.clone()), run.clone());
            let ctx = NodeContext {
                node_id: node_id.clone(),
                display_name: graph_node.display_name.clone(),
                inputs,
                config: spec.config.clone(),
                variables: Arc::new(scope),
                routing: workflow.settings.routing,
                events: event_bus.create_emitter(execution_id, node_id.clone()),
                cancellation: cancellation.child_token(),
            };

            event_bus.emit(ExecutionEvent::NodeStarted {
                execution_id,
                node_id: node_id.clone(),
                node_type: spec.node_type.clone(),
                timestamp: Utc::now(),
            });

            let start = Instant::now();
            let exec_result = match workflow.settings.max_execution_time_ms {
                Some(timeout_ms) => match timeout(Duration::from_millis(timeout_ms), node.execute(ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(NodeError::Timeout { ms: timeout_ms }),
                },
                None => node.execute(ctx).await,
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            match exec_result {
                Ok(output) => {
                    tracing::info!("Node {} completed in {}ms", node_id, duration_ms);

                    event_bus.emit(ExecutionEvent::NodeCompleted {
                        execution_id,
                        node_id: node_id.clone(),
                        outputs: output.outputs.clone(),
                        duration_ms,
                        timestamp: Utc::now(),
                    });

                    if let Some(branch) = &output.branch {
                        event_bus.emit(ExecutionEvent::PathSelected {
                            execution_id,
                            node_id: node_id.clone(),
                            path_id: branch.clone(),
                            path_name: output
                                .outputs
                                .get("pathName")
                                .map(Value::to_text)
                                .unwrap_or_default(),
                            matched: output
                                .outputs
                                .get("matched")
                                .and_then(Value::as_bool)
                                .unwrap_or(false),
                            timestamp: Utc::now(),
                        });
                        routes.insert(node_id.clone(), branch.clone());
                    }

                    outputs.insert(node_id.clone(), output.outputs);
                    finished.insert(node_id.clone());
                    completed += 1;
                }
                Err(e) => {
                    tracing::error!("Node {} failed: {}", node_id, e);

                    event_bus.emit(ExecutionEvent::NodeFailed {
                        execution_id,
                        node_id: node_id.clone(),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });

                    match e {
                        NodeError::Cancelled => return Err(FlowError::Cancelled),
                        NodeError::Evaluation(source) if spec.node_type == CONDITION_NODE_TYPE => {
                            return Err(FlowError::Routing {
                                node_id: node_id.clone(),
                                source,
                            });
                        }
                        e => match workflow.settings.on_error {
                            ErrorHandling::StopWorkflow => {
                                return Err(FlowError::Execution(format!(
                                    "Node {} failed: {}",
                                    node_id, e
                                )));
                            }
                            ErrorHandling::ContinueOnError => {
                                finished.insert(node_id.clone());
                                failed.push(node_id.clone());
                            }
                        },
                    }
                }
            }
        }

        Ok(ExecutionResult {
            execution_id,
            outputs,
            routes,
            completed_nodes: completed,
            skipped_nodes: skipped,
            failed_nodes: failed,
            total_nodes: graph.len(),
        })
    }
}

/// An edge is live once its source finished, unless the source picked a
/// branch and the edge belongs to another one.
fn edge_is_active(edge: &Edge, branch: Option<&String>) -> bool {
    match (branch, &edge.source_handle) {
        (Some(branch), Some(handle)) => handle == branch,
        _ => true,
    }
}

/// Nodes without predecessors receive the run input.
fn root_inputs(input: &Value) -> HashMap<String, Value> {
    match input {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Null => HashMap::new(),
        other => HashMap::from([("input".to_string(), other.clone())]),
    }
}

/// Map source output fields onto target inputs along handle pairs.
fn collect_node_inputs(
    active: &[&Edge],
    outputs: &OutputStore,
    routes: &BTreeMap<NodeId, String>,
) -> HashMap<String, Value> {
    let mut inputs = HashMap::new();
    for edge in active {
        if routes.contains_key(&edge.source) {
            continue;
        }
        let (Some(from_port), Some(to_port)) = (&edge.source_handle, &edge.target_handle) else {
            continue;
        };
        if let Some(value) = outputs.get(&edge.source).and_then(|o| o.get(from_port)) {
            inputs.insert(to_port.clone(), value.clone());
        }
    }
    inputs
}

/// Result of workflow execution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub outputs: OutputStore,
    /// Path taken by each routing node that ran.
    pub routes: BTreeMap<NodeId, String>,
    pub completed_nodes: usize,
    pub skipped_nodes: Vec<NodeId>,
    pub failed_nodes: Vec<NodeId>,
    pub total_nodes: usize,
}

impl ExecutionResult {
    pub fn output(&self, node_id: &str, field: &str) -> Option<&Value> {
        self.outputs.get(node_id).and_then(|o| o.get(field))
    }

    pub fn route(&self, node_id: &str) -> Option<&str> {
        self.routes.get(node_id).map(String::as_str)
    }

    pub fn was_skipped(&self, node_id: &str) -> bool {
        self.skipped_nodes.iter().any(|id| id == node_id)
    }
}
