use async_trait::async_trait;
use branchcore::{Node, NodeContext, NodeError, NodeOutput, NodeSpec, Value};
use branchruntime::{interpolate, NodeFactory, NodeMetadata, PortDefinition};

/// Simple debug node that logs a message and its inputs
pub struct DebugNode {
    message: Option<String>,
}

#[async_trait]
impl Node for DebugNode {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = match (&self.message, ctx.inputs.get("message")) {
            (Some(template), _) => interpolate(template, ctx.variables.as_ref())?,
            (None, Some(value)) => value.to_text(),
            (None, None) => "(no message)".to_string(),
        };

        ctx.events.info(format!("DEBUG: {}", message));

        // Also log all inputs for visibility
        let mut keys: Vec<&String> = ctx.inputs.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(value) = ctx.inputs.get(key) {
                ctx.events.info(format!("  {}: {}", key, value.to_text()));
            }
        }

        Ok(NodeOutput::new().with_output("message", Value::Text(message)))
    }
}

pub struct DebugNodeFactory;

impl NodeFactory for DebugNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        let message = spec
            .config
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(Box::new(DebugNode { message }))
    }

    fn node_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Logs a message and input values for debugging".to_string(),
            category: "debug".to_string(),
            outputs: vec![PortDefinition::output("message", "Logged message")],
        }
    }
}
