use async_trait::async_trait;
use branchcore::{Node, NodeContext, NodeError, NodeOutput, NodeSpec};
use branchruntime::{interpolate, resolve_operand, NodeFactory, NodeMetadata, PortDefinition};

fn template_of(spec: &NodeSpec, key: &str) -> String {
    spec.config
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Renders its `template` config against upstream outputs.
pub struct TextNode {
    template: String,
}

#[async_trait]
impl Node for TextNode {
    fn node_type(&self) -> &str {
        "text"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let text = interpolate(&self.template, ctx.variables.as_ref())?;
        Ok(NodeOutput::new().with_output("text", text))
    }
}

pub struct TextNodeFactory;

impl NodeFactory for TextNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(TextNode {
            template: template_of(spec, "template"),
        }))
    }

    fn node_type(&self) -> &str {
        "text"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Render a {{...}} template".to_string(),
            category: "text".to_string(),
            outputs: vec![PortDefinition::output("text", "Rendered template")],
        }
    }
}

/// Terminal node that publishes a value as the result of its branch.
///
/// A `value` made of a single reference keeps its type; anything else is
/// rendered as text.
pub struct OutputNode {
    value: String,
}

#[async_trait]
impl Node for OutputNode {
    fn node_type(&self) -> &str {
        "output"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = if self.value.contains("{{") {
            resolve_operand(&self.value, ctx.variables.as_ref())?
        } else {
            self.value.clone().into()
        };
        ctx.events.info(format!("{} = {}", ctx.display_name, value.to_text()));
        Ok(NodeOutput::new().with_output("output", value))
    }
}

pub struct OutputNodeFactory;

impl NodeFactory for OutputNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(OutputNode {
            value: template_of(spec, "value"),
        }))
    }

    fn node_type(&self) -> &str {
        "output"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Publish a value as a branch result".to_string(),
            category: "output".to_string(),
            outputs: vec![PortDefinition::output("output", "Published value")],
        }
    }
}
