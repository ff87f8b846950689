// crates/branchcore/tests/workflow_json_test.rs

use branchcore::{
    ConditionConfig, ErrorHandling, LogicalOperator, OperatorKind, RoutingMode, Value, Workflow,
};

const EDITOR_WORKFLOW: &str = r#"{
    "name": "Ticket triage",
    "nodes": [
        {"id": "n1", "type": "input", "displayName": "ticket", "config": {"inputType": "json"}},
        {"id": "n2", "type": "condition", "displayName": "triage", "config": {
            "variableName": "route",
            "paths": [
                {"id": "p-urgent", "name": "Urgent", "logicalOperator": "OR", "clauses": [
                    {"id": "c1", "inputField": "ticket.json.priority", "operator": "==", "value": "1"},
                    {"id": "c2", "inputField": "{{ticket.json.title}}", "operator": "contains", "value": "outage"}
                ]},
                {"id": "p-else", "name": "Else", "clauses": []}
            ]
        }},
        {"id": "n3", "type": "text", "config": {"text": "Escalating {{ticket.json.title}}"}}
    ],
    "edges": [
        {"source": "n1", "target": "n2"},
        {"source": "n2", "target": "n3", "sourceHandle": "p-urgent"}
    ],
    "settings": {"routing": "lenient"}
}"#;

#[test]
fn test_editor_workflow_deserializes() {
    let workflow: Workflow = serde_json::from_str(EDITOR_WORKFLOW).unwrap();

    assert_eq!(workflow.nodes.len(), 3);
    assert_eq!(workflow.edges[1].source_handle.as_deref(), Some("p-urgent"));
    assert_eq!(workflow.settings.routing, RoutingMode::Lenient);
    assert_eq!(workflow.settings.on_error, ErrorHandling::StopWorkflow);
    assert!(workflow.nodes[2].display_name.is_none());

    let condition = workflow.find_node("n2").unwrap();
    let config = ConditionConfig::from_config(&condition.id, &condition.config).unwrap();
    assert_eq!(config.paths[0].logical_operator, LogicalOperator::Or);
    assert_eq!(config.paths[0].clauses[0].operator, OperatorKind::Equals);
    assert_eq!(config.else_path().unwrap().name, "Else");
}

#[test]
fn test_workflow_round_trips_through_json() {
    let workflow: Workflow = serde_json::from_str(EDITOR_WORKFLOW).unwrap();
    let json = serde_json::to_string(&workflow).unwrap();
    let again: Workflow = serde_json::from_str(&json).unwrap();

    assert_eq!(again.id, workflow.id);
    assert_eq!(again.nodes[0].config.get("inputType"), Some(&Value::from("json")));
}
