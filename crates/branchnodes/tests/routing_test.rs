use branchcore::{
    condition_config, Clause, ErrorHandling, EvalError, FlowError, LogicalOperator, NodeSpec,
    OperatorKind, Path, RoutingMode, Value, Workflow, WorkflowError, WorkflowSettings,
};
use branchnodes::standard_registry;
use branchruntime::{BranchRuntime, ExecutionGraph, RuntimeConfig, SchemaRegistry};
use serde_json::json;
use std::sync::Arc;

fn runtime() -> BranchRuntime {
    BranchRuntime::with_registry(Arc::new(standard_registry()), RuntimeConfig::default())
}

const SUPPORT_TRIAGE: &str = r#"{
  "name": "support triage",
  "nodes": [
    {"id": "n1", "type": "input", "displayName": "ticket", "config": {"inputType": "json", "key": "ticket"}},
    {"id": "n2", "type": "condition", "displayName": "triage", "config": {
      "variableName": "route",
      "paths": [
        {"id": "p-urgent", "name": "Urgent", "logicalOperator": "OR", "clauses": [
          {"id": "c1", "inputField": "ticket.json.subject", "operator": "contains", "value": "outage"},
          {"id": "c2", "inputField": "{{ticket.json.severity}}", "operator": ">=", "value": "8"}
        ]},
        {"id": "p-billing", "name": "Billing", "logicalOperator": "AND", "clauses": [
          {"id": "c3", "inputField": "ticket.json.queue", "operator": "in_list", "value": "billing, payments"},
          {"id": "c4", "inputField": "ticket.json.opened", "operator": "date_between", "value": "2024-01-01,2024-12-31"}
        ]},
        {"id": "p-else", "name": "Backlog", "clauses": []}
      ]
    }},
    {"id": "n3", "type": "text", "displayName": "page", "config": {"template": "PAGE: {{ticket.json.subject}} via {{triage.pathName}}"}},
    {"id": "n4", "type": "text", "displayName": "invoice", "config": {"template": "billing ticket {{run.id}}"}},
    {"id": "n5", "type": "output", "displayName": "backlog", "config": {"value": "{{triage.route}}"}}
  ],
  "edges": [
    {"source": "n1", "target": "n2"},
    {"source": "n2", "target": "n3", "sourceHandle": "p-urgent"},
    {"source": "n2", "target": "n4", "sourceHandle": "p-billing"},
    {"source": "n2", "target": "n5", "sourceHandle": "p-else"}
  ]
}"#;

fn triage() -> Workflow {
    serde_json::from_str(SUPPORT_TRIAGE).unwrap()
}

fn ticket(value: serde_json::Value) -> Value {
    Value::from(json!({ "ticket": value }))
}

#[tokio::test]
async fn test_urgent_ticket_takes_first_path() {
    let input = ticket(json!({"subject": "Database outage", "severity": 3, "queue": "ops"}));
    let result = runtime().execute(&triage(), input).await.unwrap();

    assert_eq!(result.route("n2"), Some("p-urgent"));
    assert_eq!(
        result.output("n3", "text"),
        Some(&Value::from("PAGE: Database outage via Urgent"))
    );
    assert!(result.was_skipped("n4"));
    assert!(result.was_skipped("n5"));
}

#[tokio::test]
async fn test_billing_ticket_requires_all_clauses() {
    let inside = ticket(json!({"subject": "refund", "severity": 2, "queue": "payments", "opened": "2024-06-01"}));
    let result = runtime().execute(&triage(), inside).await.unwrap();
    assert_eq!(result.route("n2"), Some("p-billing"));
    let text = result.output("n4", "text").and_then(Value::as_str).unwrap();
    assert_eq!(text, format!("billing ticket {}", result.execution_id));

    let outside = ticket(json!({"subject": "refund", "severity": 2, "queue": "payments", "opened": "2025-02-01"}));
    let result = runtime().execute(&triage(), outside).await.unwrap();
    assert_eq!(result.route("n2"), Some("p-else"));
}

#[tokio::test]
async fn test_else_publishes_route_record() {
    let input = ticket(json!({"subject": "question", "severity": 1, "queue": "general"}));
    let result = runtime().execute(&triage(), input).await.unwrap();

    assert_eq!(result.route("n2"), Some("p-else"));
    let record = result.output("n5", "output").unwrap();
    assert_eq!(record.get_path("pathName"), Value::from("Backlog"));
    assert_eq!(record.get_path("matched"), Value::Bool(false));
    assert_eq!(result.skipped_nodes.len(), 2);
}

#[tokio::test]
async fn test_type_mismatch_is_strict_by_default() {
    // severity is not numeric, so c2 fails after c1 is false.
    let input = ticket(json!({"subject": "hello", "severity": "high", "queue": "ops"}));
    let err = runtime().execute(&triage(), input).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Routing { ref node_id, source: EvalError::TypeMismatch { .. } } if node_id == "n2"
    ));

    let mut lenient = triage();
    lenient.settings.routing = RoutingMode::Lenient;
    let input = ticket(json!({"subject": "hello", "severity": "high", "queue": "ops"}));
    let result = runtime().execute(&lenient, input).await.unwrap();
    assert_eq!(result.route("n2"), Some("p-else"));
}

#[tokio::test]
async fn test_number_input_equals_string_literal() {
    let mut workflow = Workflow::new("five");
    workflow.add_node(NodeSpec::new("gate", "condition").with_config_map(condition_config(
        vec![
            Path::new("p1", "Five").with_clause(Clause::new("c1", "input", OperatorKind::Equals, "5")),
            Path::new("p2", "Else"),
        ],
        None,
    )));

    let runtime = runtime();
    let result = runtime.execute(&workflow, Value::Number(5.0)).await.unwrap();
    assert_eq!(result.route("gate"), Some("p1"));
    let result = runtime.execute(&workflow, Value::from("six")).await.unwrap();
    assert_eq!(result.route("gate"), Some("p2"));
}

#[tokio::test]
async fn test_or_over_upstream_text_nodes() {
    let mut workflow = Workflow::new("or");
    workflow.add_node(NodeSpec::new("a", "text").with_display_name("a").with_config("template", "9"));
    workflow.add_node(NodeSpec::new("b", "text").with_display_name("b").with_config("template", "2"));
    workflow.add_node(NodeSpec::new("gate", "condition").with_config_map(condition_config(
        vec![
            Path::new("p1", "Either")
                .with_operator(LogicalOperator::Or)
                .with_clause(Clause::new("c1", "a.text", OperatorKind::Equals, "1"))
                .with_clause(Clause::new("c2", "b.text", OperatorKind::Equals, "2")),
            Path::new("else", "Else"),
        ],
        None,
    )));
    workflow.connect("a", "gate");
    workflow.connect("b", "gate");

    let result = runtime().execute(&workflow, Value::Null).await.unwrap();
    assert_eq!(result.route("gate"), Some("p1"));
}

#[tokio::test]
async fn test_missing_reference_strict_and_lenient() {
    let build = |routing| {
        let mut workflow = Workflow::new("missing").with_settings(WorkflowSettings {
            routing,
            on_error: ErrorHandling::StopWorkflow,
            ..WorkflowSettings::default()
        });
        workflow.add_node(NodeSpec::new("gate", "condition").with_config_map(condition_config(
            vec![
                Path::new("p1", "Broken")
                    .with_clause(Clause::new("c1", "{{missing.field}}", OperatorKind::Equals, "x")),
                Path::new("p2", "Works")
                    .with_clause(Clause::new("c2", "input.flag", OperatorKind::Equals, "true")),
                Path::new("else", "Else"),
            ],
            None,
        )));
        workflow
    };
    let input = Value::from(json!({"flag": true}));

    let err = runtime()
        .execute(&build(RoutingMode::Strict), input.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::Routing { source: EvalError::UnknownVariable { .. }, .. }
    ));

    let result = runtime()
        .execute(&build(RoutingMode::Lenient), input)
        .await
        .unwrap();
    assert_eq!(result.route("gate"), Some("p2"));
}

#[tokio::test]
async fn test_malformed_regex_rejected_before_run() {
    let mut workflow = Workflow::new("regex");
    workflow.add_node(NodeSpec::new("gate", "condition").with_config_map(condition_config(
        vec![
            Path::new("p1", "Code")
                .with_clause(Clause::new("c1", "input", OperatorKind::MatchesRegex, "[a-z")),
            Path::new("else", "Else"),
        ],
        None,
    )));

    let err = runtime().execute(&workflow, Value::from("abc")).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::InvalidRegex { ref clause_id, .. }) if clause_id == "c1"
    ));
}

#[test]
fn test_available_variables_for_condition() {
    let workflow = triage();
    let graph = ExecutionGraph::build(&workflow).unwrap();
    let schemas = SchemaRegistry::from_node_registry(&standard_registry());

    let vars = graph.available_variables("n2", &schemas);
    assert!(vars.contains(&"ticket.json".to_string()));
    assert!(!vars.iter().any(|v| v.starts_with("page.")));

    let downstream = graph.available_variables("n5", &schemas);
    assert!(downstream.contains(&"triage.pathName".to_string()));
    assert!(downstream.contains(&"triage.route".to_string()));
}

#[tokio::test]
async fn test_unary_clause_needs_no_value() {
    let mut workflow = Workflow::new("blank");
    workflow.add_node(NodeSpec::new("gate", "condition").with_config_map(condition_config(
        vec![
            Path::new("blank", "Blank")
                .with_clause(Clause::unary("c1", "input.comment", OperatorKind::IsEmpty)),
            Path::new("else", "Else"),
        ],
        None,
    )));

    let runtime = runtime();
    let result = runtime
        .execute(&workflow, Value::from(json!({"comment": ""})))
        .await
        .unwrap();
    assert_eq!(result.route("gate"), Some("blank"));

    let result = runtime
        .execute(&workflow, Value::from(json!({"comment": "looks good"})))
        .await
        .unwrap();
    assert_eq!(result.route("gate"), Some("else"));
}

#[tokio::test]
async fn test_unknown_operator_rejected_before_run() {
    let raw = SUPPORT_TRIAGE.replace(r#""operator": "contains""#, r#""operator": "approximately""#);
    let workflow: Workflow = serde_json::from_str(&raw).unwrap();

    let err = runtime().execute(&workflow, Value::Null).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::InvalidClause {
            ref clause_id,
            source: EvalError::InvalidOperand { .. },
        }) if clause_id == "c1"
    ));
}

#[tokio::test]
async fn test_mistyped_branch_handle_rejected_before_run() {
    let raw = SUPPORT_TRIAGE.replace(r#""sourceHandle": "p-urgent""#, r#""sourceHandle": "p-urgnet""#);
    let workflow: Workflow = serde_json::from_str(&raw).unwrap();

    let input = ticket(json!({"subject": "Database outage", "severity": 3, "queue": "ops"}));
    let err = runtime().execute(&workflow, input).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::UnknownBranchHandle { ref node_id, ref handle })
            if node_id == "n2" && handle == "p-urgnet"
    ));
}
