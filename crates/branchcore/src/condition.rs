//! Authored routing rules of a Condition node.

use crate::{EvalError, RoutingMode, Value, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Node type string of the Condition node.
pub const CONDITION_NODE_TYPE: &str = "condition";

/// Comparison operator of a clause.
///
/// Deserialized through [`FromStr`], so an unknown name is an
/// [`EvalError::InvalidOperand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum OperatorKind {
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_contains")]
    NotContains,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "endswith")]
    EndsWith,
    #[serde(rename = "is_empty")]
    IsEmpty,
    #[serde(rename = "is_not_empty")]
    IsNotEmpty,
    #[serde(rename = "matches_regex")]
    MatchesRegex,
    #[serde(rename = "in_list")]
    InList,
    #[serde(rename = "not_in_list")]
    NotInList,
    #[serde(rename = "length_equals")]
    LengthEquals,
    #[serde(rename = "length_greater_than")]
    LengthGreaterThan,
    #[serde(rename = "length_less_than")]
    LengthLessThan,
    #[serde(rename = "date_before")]
    DateBefore,
    #[serde(rename = "date_after")]
    DateAfter,
    #[serde(rename = "date_equals")]
    DateEquals,
    #[serde(rename = "date_between")]
    DateBetween,
    #[serde(rename = "type_equals")]
    TypeEquals,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 23] = [
        OperatorKind::Equals,
        OperatorKind::NotEquals,
        OperatorKind::GreaterThan,
        OperatorKind::GreaterOrEqual,
        OperatorKind::LessThan,
        OperatorKind::LessOrEqual,
        OperatorKind::Contains,
        OperatorKind::NotContains,
        OperatorKind::StartsWith,
        OperatorKind::EndsWith,
        OperatorKind::IsEmpty,
        OperatorKind::IsNotEmpty,
        OperatorKind::MatchesRegex,
        OperatorKind::InList,
        OperatorKind::NotInList,
        OperatorKind::LengthEquals,
        OperatorKind::LengthGreaterThan,
        OperatorKind::LengthLessThan,
        OperatorKind::DateBefore,
        OperatorKind::DateAfter,
        OperatorKind::DateEquals,
        OperatorKind::DateBetween,
        OperatorKind::TypeEquals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Equals => "==",
            OperatorKind::NotEquals => "!=",
            OperatorKind::GreaterThan => ">",
            OperatorKind::GreaterOrEqual => ">=",
            OperatorKind::LessThan => "<",
            OperatorKind::LessOrEqual => "<=",
            OperatorKind::Contains => "contains",
            OperatorKind::NotContains => "not_contains",
            OperatorKind::StartsWith => "startswith",
            OperatorKind::EndsWith => "endswith",
            OperatorKind::IsEmpty => "is_empty",
            OperatorKind::IsNotEmpty => "is_not_empty",
            OperatorKind::MatchesRegex => "matches_regex",
            OperatorKind::InList => "in_list",
            OperatorKind::NotInList => "not_in_list",
            OperatorKind::LengthEquals => "length_equals",
            OperatorKind::LengthGreaterThan => "length_greater_than",
            OperatorKind::LengthLessThan => "length_less_than",
            OperatorKind::DateBefore => "date_before",
            OperatorKind::DateAfter => "date_after",
            OperatorKind::DateEquals => "date_equals",
            OperatorKind::DateBetween => "date_between",
            OperatorKind::TypeEquals => "type_equals",
        }
    }

    /// Every operator except the emptiness tests needs a right-hand value.
    pub fn requires_value(&self) -> bool {
        !matches!(self, OperatorKind::IsEmpty | OperatorKind::IsNotEmpty)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatorKind::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| EvalError::InvalidOperand {
                operator: s.to_string(),
                operand: s.to_string(),
                reason: "unknown operator".to_string(),
            })
    }
}

impl TryFrom<String> for OperatorKind {
    type Error = EvalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// A single comparison predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub id: String,
    pub input_field: String,
    pub operator: OperatorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Clause {
    pub fn new(
        id: impl Into<String>,
        input_field: impl Into<String>,
        operator: OperatorKind,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            input_field: input_field.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// Clause for an operator that takes no right-hand value.
    pub fn unary(id: impl Into<String>, input_field: impl Into<String>, operator: OperatorKind) -> Self {
        Self {
            id: id.into(),
            input_field: input_field.into(),
            operator,
            value: None,
        }
    }
}

/// One branch of a Condition node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

impl Path {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            clauses: Vec::new(),
            logical_operator: LogicalOperator::And,
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn with_operator(mut self, operator: LogicalOperator) -> Self {
        self.logical_operator = operator;
        self
    }
}

/// Configuration of a Condition node, read from its `config` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    pub paths: Vec<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    /// Overrides the workflow's routing mode for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RoutingMode>,
}

impl ConditionConfig {
    /// Parse and check the structural invariants: at least two paths, the
    /// last one clause-less, and a value on every clause that needs one.
    pub fn from_config(
        node_id: &str,
        config: &BTreeMap<String, Value>,
    ) -> Result<Self, WorkflowError> {
        check_operators(config)?;
        let json = serde_json::Value::from(Value::Object(config.clone()));
        let parsed: ConditionConfig =
            serde_json::from_value(json).map_err(|e| WorkflowError::InvalidCondition {
                node_id: node_id.to_string(),
                reason: e.to_string(),
            })?;
        parsed.check(node_id)?;
        Ok(parsed)
    }

    fn check(&self, node_id: &str) -> Result<(), WorkflowError> {
        if self.paths.len() < 2 {
            return Err(WorkflowError::InvalidCondition {
                node_id: node_id.to_string(),
                reason: format!("expected at least 2 paths, found {}", self.paths.len()),
            });
        }
        if let Some(last) = self.paths.last() {
            if !last.clauses.is_empty() {
                return Err(WorkflowError::InvalidCondition {
                    node_id: node_id.to_string(),
                    reason: format!("else path '{}' must not have clauses", last.id),
                });
            }
        }
        for clause in self.paths.iter().flat_map(|p| p.clauses.iter()) {
            let missing = clause.value.as_deref().map_or(true, |v| v.trim().is_empty());
            if clause.operator.requires_value() && missing {
                return Err(WorkflowError::MissingClauseValue {
                    clause_id: clause.id.clone(),
                    operator: clause.operator.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn to_config(&self) -> BTreeMap<String, Value> {
        let json = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        match Value::from(json) {
            Value::Object(map) => map,
            _ => BTreeMap::new(),
        }
    }

    pub fn else_path(&self) -> Option<&Path> {
        self.paths.last()
    }

    /// Authored paths that are evaluated, in order.
    pub fn guarded_paths(&self) -> &[Path] {
        match self.paths.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

/// Parse every clause operator before the config is deserialized, so an
/// unknown operator keeps its [`EvalError`] and the clause id.
fn check_operators(config: &BTreeMap<String, Value>) -> Result<(), WorkflowError> {
    let Some(Value::Array(paths)) = config.get("paths") else {
        return Ok(());
    };
    let clauses = paths
        .iter()
        .filter_map(|path| match path.get_path("clauses") {
            Value::Array(clauses) => Some(clauses),
            _ => None,
        })
        .flatten();

    for clause in clauses {
        let Value::Text(operator) = clause.get_path("operator") else {
            continue;
        };
        if let Err(source) = operator.parse::<OperatorKind>() {
            return Err(WorkflowError::InvalidClause {
                clause_id: clause.get_path("id").to_text(),
                source,
            });
        }
    }
    Ok(())
}

/// Selected branch of a Condition node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub path_id: String,
    pub path_name: String,
    /// `false` when the Else path was taken.
    pub matched: bool,
    pub index: usize,
}

impl Selection {
    /// Output fields written by the Condition node.
    pub fn to_outputs(&self, variable_name: Option<&str>) -> BTreeMap<String, Value> {
        let mut record = BTreeMap::new();
        record.insert("matched".to_string(), Value::Bool(self.matched));
        record.insert("pathId".to_string(), Value::from(self.path_id.as_str()));
        record.insert("pathName".to_string(), Value::from(self.path_name.as_str()));

        let mut outputs = record.clone();
        if let Some(name) = variable_name.filter(|n| !n.is_empty()) {
            outputs.insert(name.to_string(), Value::Object(record));
        }
        outputs
    }
}

/// Convenience for building Condition nodes in code.
pub fn condition_config(paths: Vec<Path>, variable_name: Option<&str>) -> BTreeMap<String, Value> {
    ConditionConfig {
        paths,
        variable_name: variable_name.map(str::to_string),
        mode: None,
    }
    .to_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_from(json: serde_json::Value) -> BTreeMap<String, Value> {
        match Value::from(json) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_editor_config() {
        let config = config_from(json!({
            "variableName": "route",
            "paths": [
                {
                    "id": "p1",
                    "name": "High",
                    "logicalOperator": "OR",
                    "clauses": [
                        {"id": "c1", "inputField": "ai_0.response", "operator": "contains", "value": "urgent"},
                        {"id": "c2", "inputField": "{{input.score}}", "operator": ">", "value": "80"}
                    ]
                },
                {"id": "else", "name": "Else", "clauses": []}
            ]
        }));
        let parsed = ConditionConfig::from_config("cond", &config).unwrap();
        assert_eq!(parsed.paths.len(), 2);
        assert_eq!(parsed.paths[0].logical_operator, LogicalOperator::Or);
        assert_eq!(parsed.paths[0].clauses[1].operator, OperatorKind::GreaterThan);
        assert_eq!(parsed.variable_name.as_deref(), Some("route"));
        assert_eq!(parsed.guarded_paths().len(), 1);
        assert_eq!(parsed.else_path().unwrap().id, "else");
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let config = config_from(json!({
            "paths": [
                {"id": "p1", "name": "A", "clauses": [
                    {"id": "c1", "inputField": "x", "operator": "approximately", "value": "1"}
                ]},
                {"id": "else", "name": "Else"}
            ]
        }));
        match ConditionConfig::from_config("cond", &config) {
            Err(WorkflowError::InvalidClause { clause_id, source }) => {
                assert_eq!(clause_id, "c1");
                assert!(matches!(source, EvalError::InvalidOperand { ref operator, .. } if operator == "approximately"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let direct: Result<Clause, _> = serde_json::from_value(json!(
            {"id": "c1", "inputField": "x", "operator": "approximately", "value": "1"}
        ));
        assert!(direct.unwrap_err().to_string().contains("unknown operator"));
        assert!(matches!(
            "approximately".parse::<OperatorKind>(),
            Err(EvalError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_else_path_must_be_clause_less() {
        let paths = vec![
            Path::new("p1", "A").with_clause(Clause::new("c1", "x", OperatorKind::Equals, "1")),
            Path::new("p2", "B").with_clause(Clause::new("c2", "x", OperatorKind::Equals, "2")),
        ];
        let config = condition_config(paths, None);
        assert!(matches!(
            ConditionConfig::from_config("cond", &config),
            Err(WorkflowError::InvalidCondition { .. })
        ));
    }

    #[test]
    fn test_single_path_is_rejected() {
        let config = condition_config(vec![Path::new("else", "Else")], None);
        assert!(ConditionConfig::from_config("cond", &config).is_err());
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let mut clause = Clause::new("c1", "x", OperatorKind::Contains, "");
        clause.value = None;
        let paths = vec![Path::new("p1", "A").with_clause(clause), Path::new("else", "Else")];
        let config = condition_config(paths, None);
        assert!(matches!(
            ConditionConfig::from_config("cond", &config),
            Err(WorkflowError::MissingClauseValue { .. })
        ));

        let unary = Clause::unary("c2", "x", OperatorKind::IsEmpty);
        let paths = vec![Path::new("p1", "A").with_clause(unary), Path::new("else", "Else")];
        assert!(ConditionConfig::from_config("cond", &condition_config(paths, None)).is_ok());
    }

    #[test]
    fn test_operator_names_round_trip() {
        for op in OperatorKind::ALL {
            assert_eq!(op.as_str().parse::<OperatorKind>().unwrap(), op);
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }

    #[test]
    fn test_selection_outputs() {
        let selection = Selection {
            path_id: "p1".into(),
            path_name: "High".into(),
            matched: true,
            index: 0,
        };
        let outputs = selection.to_outputs(Some("route"));
        assert_eq!(outputs["pathName"], Value::from("High"));
        assert_eq!(outputs["route"].get_path("pathId"), Value::from("p1"));
        assert_eq!(outputs["route"].get_path("matched"), Value::Bool(true));
    }
}
