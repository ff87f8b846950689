use async_trait::async_trait;
use branchcore::{
    condition_config, Clause, ConditionConfig, ErrorHandling, EvalError, ExecutionEvent,
    FlowError, Node, NodeContext, NodeError, NodeOutput, NodeSpec, OperatorKind, Path,
    RoutingMode, Value, Workflow, WorkflowSettings,
};
use branchruntime::{interpolate, select_path, BranchRuntime, NodeFactory, NodeRegistry, RuntimeConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Emits its `outputs` config as outputs.
struct Emit {
    outputs: Value,
}

#[async_trait]
impl Node for Emit {
    fn node_type(&self) -> &str {
        "mock.emit"
    }

    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let outputs = self.outputs.as_object().cloned().unwrap_or_default();
        Ok(NodeOutput::new().with_outputs(outputs))
    }
}

/// Interpolates its `template` config and echoes inputs.
struct Read {
    template: String,
}

#[async_trait]
impl Node for Read {
    fn node_type(&self) -> &str {
        "mock.read"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let text = interpolate(&self.template, ctx.variables.as_ref())?;
        let mut output = NodeOutput::new().with_output("text", text);
        for (key, value) in ctx.inputs {
            output = output.with_output(format!("in_{}", key), value);
        }
        Ok(output)
    }
}

struct Gate {
    config: ConditionConfig,
}

#[async_trait]
impl Node for Gate {
    fn node_type(&self) -> &str {
        "condition"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mode = self.config.mode.unwrap_or(ctx.routing);
        let selection = select_path(&self.config.paths, ctx.variables.as_ref(), mode)?;
        Ok(NodeOutput::new()
            .with_outputs(selection.to_outputs(self.config.variable_name.as_deref()))
            .with_branch(selection.path_id))
    }
}

struct Fail;

#[async_trait]
impl Node for Fail {
    fn node_type(&self) -> &str {
        "mock.fail"
    }

    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

/// Sleeps for a second unless cancelled.
struct Slow;

#[async_trait]
impl Node for Slow {
    fn node_type(&self) -> &str {
        "mock.slow"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => Ok(NodeOutput::new()),
            _ = ctx.cancellation.cancelled() => Err(NodeError::Cancelled),
        }
    }
}

struct MockFactory(&'static str);

impl NodeFactory for MockFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        let text = |key: &str| {
            spec.config
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let node: Box<dyn Node> = match self.0 {
            "mock.emit" => Box::new(Emit {
                outputs: spec.config.get("outputs").cloned().unwrap_or_default(),
            }),
            "mock.read" => Box::new(Read {
                template: text("template"),
            }),
            "condition" => Box::new(Gate {
                config: ConditionConfig::from_config(&spec.id, &spec.config)
                    .map_err(|e| NodeError::Configuration(e.to_string()))?,
            }),
            "mock.fail" => Box::new(Fail),
            _ => Box::new(Slow),
        };
        Ok(node)
    }

    fn node_type(&self) -> &str {
        self.0
    }
}

fn runtime() -> BranchRuntime {
    let mut registry = NodeRegistry::new();
    for node_type in ["mock.emit", "mock.read", "condition", "mock.fail", "mock.slow"] {
        registry.register(Arc::new(MockFactory(node_type)));
    }
    BranchRuntime::with_registry(Arc::new(registry), RuntimeConfig::default())
}

fn emit(id: &str, name: &str, outputs: serde_json::Value) -> NodeSpec {
    NodeSpec::new(id, "mock.emit")
        .with_display_name(name)
        .with_config("outputs", Value::from(outputs))
}

fn read(id: &str, template: &str) -> NodeSpec {
    NodeSpec::new(id, "mock.read").with_config("template", template)
}

fn gate(id: &str, paths: Vec<Path>) -> NodeSpec {
    NodeSpec::new(id, "condition").with_config_map(condition_config(paths, Some("route")))
}

/// scorer -> gate -> (high | low)
fn scoring_workflow() -> Workflow {
    let mut workflow = Workflow::new("scoring");
    workflow.add_node(emit("scorer", "scorer", json!({"score": 91})));
    workflow.add_node(gate(
        "gate",
        vec![
            Path::new("high", "High")
                .with_clause(Clause::new("c1", "scorer.score", OperatorKind::GreaterThan, "80")),
            Path::new("else", "Else"),
        ],
    ));
    workflow.add_node(read("high_branch", "high {{scorer.score}}"));
    workflow.add_node(read("low_branch", "low"));
    workflow.connect("scorer", "gate");
    workflow.connect_branch("gate", "high", "high_branch");
    workflow.connect_branch("gate", "else", "low_branch");
    workflow
}

#[tokio::test]
async fn test_untaken_branch_is_skipped() {
    let runtime = runtime();
    let mut events = runtime.subscribe_events();

    let result = runtime.execute(&scoring_workflow(), Value::Null).await.unwrap();

    assert_eq!(result.route("gate"), Some("high"));
    assert_eq!(result.output("gate", "pathName"), Some(&Value::from("High")));
    assert_eq!(
        result.output("gate", "route").map(|v| v.get_path("matched")),
        Some(Value::Bool(true))
    );
    assert_eq!(result.output("high_branch", "text"), Some(&Value::from("high 91")));
    assert!(result.was_skipped("low_branch"));
    assert_eq!(result.completed_nodes, 3);
    assert_eq!(result.total_nodes, 4);

    let mut selected = None;
    while let Ok(event) = events.try_recv() {
        if let ExecutionEvent::PathSelected { node_id, path_id, matched, .. } = event {
            selected = Some((node_id, path_id, matched));
        }
    }
    assert_eq!(selected, Some(("gate".to_string(), "high".to_string(), true)));
}

#[tokio::test]
async fn test_reference_to_skipped_node_is_not_yet_computed() {
    let mut workflow = scoring_workflow();
    workflow.nodes[2] = emit("high_branch", "highs", json!({"value": 1}));
    workflow.add_node(read("join", "{{highs.value}}"));
    workflow.connect("high_branch", "join");
    workflow.connect("low_branch", "join");

    // Force the else branch.
    workflow.nodes[0] = emit("scorer", "scorer", json!({"score": 10}));

    let err = runtime().execute(&workflow, Value::Null).await.unwrap_err();
    match err {
        FlowError::Execution(message) => assert!(message.contains("has not produced outputs")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_strict_routing_error_halts_run() {
    let mut workflow = Workflow::new("strict").with_settings(WorkflowSettings {
        on_error: ErrorHandling::ContinueOnError,
        ..WorkflowSettings::default()
    });
    workflow.add_node(gate(
        "gate",
        vec![
            Path::new("p1", "Broken")
                .with_clause(Clause::new("c1", "{{missing.field}}", OperatorKind::Equals, "x")),
            Path::new("else", "Else"),
        ],
    ));
    workflow.add_node(read("after", "done"));
    workflow.connect_branch("gate", "else", "after");

    let err = runtime().execute(&workflow, Value::Null).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Routing { node_id, source: EvalError::UnknownVariable { .. } } if node_id == "gate"
    ));
}

#[tokio::test]
async fn test_lenient_routing_falls_through() {
    let mut workflow = Workflow::new("lenient").with_settings(WorkflowSettings {
        routing: RoutingMode::Lenient,
        ..WorkflowSettings::default()
    });
    workflow.add_node(gate(
        "gate",
        vec![
            Path::new("p1", "Broken")
                .with_clause(Clause::new("c1", "{{missing.field}}", OperatorKind::Equals, "x")),
            Path::new("else", "Else"),
        ],
    ));

    let result = runtime().execute(&workflow, Value::Null).await.unwrap();
    assert_eq!(result.route("gate"), Some("else"));
    assert_eq!(result.output("gate", "matched"), Some(&Value::Bool(false)));
}

#[tokio::test]
async fn test_run_input_reaches_conditions() {
    let mut workflow = Workflow::new("input");
    workflow.add_node(gate(
        "gate",
        vec![
            Path::new("five", "Five").with_clause(Clause::new("c1", "input", OperatorKind::Equals, "5")),
            Path::new("else", "Else"),
        ],
    ));
    let runtime = runtime();

    let five = runtime.execute(&workflow, Value::Number(5.0)).await.unwrap();
    assert_eq!(five.route("gate"), Some("five"));

    let six = runtime.execute(&workflow, Value::from("six")).await.unwrap();
    assert_eq!(six.route("gate"), Some("else"));
}

#[tokio::test]
async fn test_handles_pass_outputs_as_inputs() {
    let mut workflow = Workflow::new("handles");
    workflow.add_node(emit("src", "src", json!({"text": "hello"})));
    workflow.add_node(read("dst", "x"));
    workflow.edges.push(
        branchcore::Edge::new("src", "dst")
            .with_source_handle("text")
            .with_target_handle("message"),
    );

    let result = runtime().execute(&workflow, Value::Null).await.unwrap();
    assert_eq!(result.output("dst", "in_message"), Some(&Value::from("hello")));
}

#[tokio::test]
async fn test_continue_on_error() {
    let mut workflow = Workflow::new("continue").with_settings(WorkflowSettings {
        on_error: ErrorHandling::ContinueOnError,
        ..WorkflowSettings::default()
    });
    workflow.add_node(NodeSpec::new("bad", "mock.fail"));
    workflow.add_node(read("next", "still here"));
    workflow.connect("bad", "next");

    let result = runtime().execute(&workflow, Value::Null).await.unwrap();
    assert_eq!(result.failed_nodes, vec!["bad".to_string()]);
    assert_eq!(result.output("next", "text"), Some(&Value::from("still here")));

    workflow.settings.on_error = ErrorHandling::StopWorkflow;
    assert!(matches!(
        runtime().execute(&workflow, Value::Null).await,
        Err(FlowError::Execution(_))
    ));
}

#[tokio::test]
async fn test_cancelled_run_stops_before_next_node() {
    let runtime = runtime();
    let mut events = runtime.subscribe_events();
    let token = CancellationToken::new();
    token.cancel();

    let err = runtime
        .execute_with_cancellation(&scoring_workflow(), Value::Null, token)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));

    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, ExecutionEvent::NodeStarted { .. }));
    }
}

#[tokio::test]
async fn test_cancellation_reaches_suspended_node() {
    let mut workflow = Workflow::new("slow");
    workflow.add_node(NodeSpec::new("wait", "mock.slow"));
    workflow.add_node(read("after", "never"));
    workflow.connect("wait", "after");

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = runtime()
        .execute_with_cancellation(&workflow, Value::Null, token)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
}

#[tokio::test]
async fn test_node_timeout() {
    let mut workflow = Workflow::new("timeout").with_settings(WorkflowSettings {
        max_execution_time_ms: Some(20),
        ..WorkflowSettings::default()
    });
    workflow.add_node(NodeSpec::new("wait", "mock.slow"));

    let err = runtime().execute(&workflow, Value::Null).await.unwrap_err();
    match err {
        FlowError::Execution(message) => assert!(message.contains("Timeout after 20ms"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_configuration_blocks_run() {
    let mut workflow = scoring_workflow();
    workflow.nodes[2] = read("high_branch", "x").with_display_name("scorer");

    let runtime = runtime();
    let mut events = runtime.subscribe_events();
    let err = runtime.execute(&workflow, Value::Null).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Workflow(branchcore::WorkflowError::DuplicateDisplayName { .. })
    ));
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, ExecutionEvent::NodeStarted { .. }));
    }
}

#[tokio::test]
async fn test_batch_runs_are_isolated() {
    let mut workflow = Workflow::new("batch");
    workflow.add_node(gate(
        "gate",
        vec![
            Path::new("big", "Big")
                .with_clause(Clause::new("c1", "input.n", OperatorKind::GreaterOrEqual, "10")),
            Path::new("else", "Else"),
        ],
    ));
    let runtime = BranchRuntime::with_registry(
        runtime().registry().clone(),
        RuntimeConfig {
            max_concurrent_runs: 2,
            ..RuntimeConfig::default()
        },
    );

    let inputs = [1, 50, 9, 10]
        .into_iter()
        .map(|n| Value::from(json!({ "n": n })))
        .collect();
    let results = runtime.execute_batch(&workflow, inputs).await;

    let routes: Vec<_> = results
        .iter()
        .map(|r| r.as_ref().unwrap().route("gate").unwrap().to_string())
        .collect();
    assert_eq!(routes, vec!["else", "big", "else", "big"]);

    let ids: std::collections::HashSet<_> =
        results.iter().map(|r| r.as_ref().unwrap().execution_id).collect();
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_registered_workflow() {
    let runtime = runtime();
    let id = runtime.register_workflow(scoring_workflow()).await;
    let result = runtime.execute_workflow(id, Value::Null).await.unwrap();
    assert_eq!(result.route("gate"), Some("high"));
}
