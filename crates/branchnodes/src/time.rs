use async_trait::async_trait;
use branchcore::{Node, NodeContext, NodeError, NodeOutput, NodeSpec, Value};
use branchruntime::{NodeFactory, NodeMetadata};
use std::collections::BTreeMap;
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode {
    delay_ms: u64,
}

#[async_trait]
impl Node for DelayNode {
    fn node_type(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        ctx.events.info(format!("Delaying for {}ms", self.delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(self.delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        // Pass through any inputs
        let outputs: BTreeMap<String, Value> = ctx.inputs.into_iter().collect();
        Ok(NodeOutput::new().with_outputs(outputs))
    }

    fn validate_config(&self, config: &BTreeMap<String, Value>) -> Result<(), NodeError> {
        match config.get("delay_ms") {
            None => Ok(()),
            Some(v) if v.as_f64().map_or(false, |ms| ms >= 0.0) => Ok(()),
            Some(v) => Err(NodeError::Configuration(format!(
                "delay_ms must be a non-negative number, got {}",
                v.to_text()
            ))),
        }
    }
}

pub struct DelayNodeFactory;

impl NodeFactory for DelayNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        let delay_ms = spec
            .config
            .get("delay_ms")
            .and_then(|v| v.as_f64())
            .unwrap_or(1000.0) as u64; // Default to 1 second if not specified
        Ok(Box::new(DelayNode { delay_ms }))
    }

    fn node_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Delay execution for specified milliseconds, passing inputs through"
                .to_string(),
            category: "time".to_string(),
            outputs: vec![],
        }
    }
}
