use async_trait::async_trait;
use branchcore::{Node, NodeContext, NodeError, NodeOutput, NodeSpec, Value};
use branchruntime::{interpolate, resolve_operand, NodeFactory, NodeMetadata, PortDefinition};

fn config_text(spec: &NodeSpec, key: &str) -> Option<String> {
    spec.config.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Parse a JSON string into a structured value
///
/// Reads the `json` input, or renders the `json` config template when set.
pub struct JsonParseNode {
    source: Option<String>,
}

#[async_trait]
impl Node for JsonParseNode {
    fn node_type(&self) -> &str {
        "transform.json_parse"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = match &self.source {
            Some(template) => interpolate(template, ctx.variables.as_ref())?,
            None => ctx
                .require_input("json")?
                .as_str()
                .ok_or_else(|| NodeError::InvalidInputType {
                    field: "json".to_string(),
                    expected: "string".to_string(),
                    actual: "other".to_string(),
                })?
                .to_string(),
        };

        let parsed: serde_json::Value = serde_json::from_str(&input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(NodeOutput::new().with_output("parsed", Value::from(parsed)))
    }
}

pub struct JsonParseNodeFactory;

impl NodeFactory for JsonParseNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(JsonParseNode {
            source: config_text(spec, "json"),
        }))
    }

    fn node_type(&self) -> &str {
        "transform.json_parse"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Parse JSON string".to_string(),
            category: "transform".to_string(),
            outputs: vec![PortDefinition::output("parsed", "Parsed value")],
        }
    }
}

/// Stringify a value to JSON
///
/// Reads the `value` input, or resolves the `value` config reference when set.
pub struct JsonStringifyNode {
    source: Option<String>,
}

#[async_trait]
impl Node for JsonStringifyNode {
    fn node_type(&self) -> &str {
        "transform.json_stringify"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = match &self.source {
            Some(reference) => resolve_operand(reference, ctx.variables.as_ref())?,
            None => ctx.require_input("value")?.clone(),
        };

        let json_str = serde_json::to_string_pretty(&value)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(NodeOutput::new().with_output("json", json_str))
    }
}

pub struct JsonStringifyNodeFactory;

impl NodeFactory for JsonStringifyNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(JsonStringifyNode {
            source: config_text(spec, "value"),
        }))
    }

    fn node_type(&self) -> &str {
        "transform.json_stringify"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Convert value to JSON string".to_string(),
            category: "transform".to_string(),
            outputs: vec![PortDefinition::output("json", "Pretty-printed JSON")],
        }
    }
}
