use async_trait::async_trait;
use branchcore::{Node, NodeContext, NodeError, NodeOutput, NodeSpec, Value};
use branchruntime::{NodeFactory, NodeMetadata, PortDefinition};

const SUBTYPES: [&str; 3] = ["text", "image", "json"];

/// Entry point that exposes one field of the run input.
///
/// Config: `inputType` (`text` | `image` | `json`, default `text`), `key`
/// (run input field, defaults to the subtype) and an optional `default`.
/// The value is published under the subtype name.
pub struct InputNode {
    subtype: String,
    key: String,
    default: Option<Value>,
}

impl InputNode {
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, NodeError> {
        let subtype = spec
            .config
            .get("inputType")
            .and_then(|v| v.as_str())
            .unwrap_or("text")
            .to_string();
        if !SUBTYPES.contains(&subtype.as_str()) {
            return Err(NodeError::Configuration(format!(
                "unknown inputType '{}', expected one of {}",
                subtype,
                SUBTYPES.join(", ")
            )));
        }
        let key = spec
            .config
            .get("key")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| subtype.clone());
        Ok(Self {
            subtype,
            key,
            default: spec.config.get("default").cloned(),
        })
    }
}

#[async_trait]
impl Node for InputNode {
    fn node_type(&self) -> &str {
        "input"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut value = ctx.variables.resolve(&format!("input.{}", self.key))?;
        if value.is_null() {
            value = self.default.clone().unwrap_or(Value::Null);
        }

        let value = match (self.subtype.as_str(), value) {
            ("json", Value::Text(raw)) => {
                let parsed: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
                    NodeError::InvalidInputType {
                        field: self.key.clone(),
                        expected: "JSON document".to_string(),
                        actual: e.to_string(),
                    }
                })?;
                Value::from(parsed)
            }
            ("json", other) => other,
            (_, Value::Null) => Value::from(""),
            (_, Value::Text(text)) => Value::Text(text),
            (_, other) => Value::Text(other.to_text()),
        };

        Ok(NodeOutput::new().with_output(self.subtype.clone(), value))
    }
}

pub struct InputNodeFactory;

impl NodeFactory for InputNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(InputNode::from_spec(spec)?))
    }

    fn node_type(&self) -> &str {
        "input"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Expose a field of the run input as text, image or json".to_string(),
            category: "input".to_string(),
            outputs: SUBTYPES
                .iter()
                .map(|s| PortDefinition::output(*s, "Present when inputType matches"))
                .collect(),
        }
    }
}
