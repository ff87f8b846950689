use async_trait::async_trait;
use branchcore::{
    ConditionConfig, Node, NodeContext, NodeError, NodeOutput, NodeSpec, Value,
    CONDITION_NODE_TYPE,
};
use branchruntime::{select_path_reporting, NodeFactory, NodeMetadata, PortDefinition};
use std::collections::BTreeMap;

/// Routes the run down the first path whose clauses hold.
///
/// Writes `matched`, `pathId` and `pathName` (and the same record under
/// `variableName` when configured) and reports the path id as its branch.
pub struct ConditionNode {
    config: ConditionConfig,
}

impl ConditionNode {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    pub fn from_spec(spec: &NodeSpec) -> Result<Self, NodeError> {
        ConditionConfig::from_config(&spec.id, &spec.config)
            .map(Self::new)
            .map_err(|e| NodeError::Configuration(e.to_string()))
    }
}

#[async_trait]
impl Node for ConditionNode {
    fn node_type(&self) -> &str {
        CONDITION_NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mode = self.config.mode.unwrap_or(ctx.routing);
        let selection = select_path_reporting(
            &self.config.paths,
            ctx.variables.as_ref(),
            mode,
            |path, clause_id, err| {
                ctx.events.warn(format!(
                    "path '{}' not matched: clause '{}' failed: {}",
                    path.id, clause_id, err
                ));
            },
        )?;

        ctx.events.info(format!(
            "{} -> {}{}",
            ctx.display_name,
            selection.path_name,
            if selection.matched { "" } else { " (fallback)" }
        ));

        Ok(NodeOutput::new()
            .with_outputs(selection.to_outputs(self.config.variable_name.as_deref()))
            .with_branch(selection.path_id))
    }

    fn validate_config(&self, config: &BTreeMap<String, Value>) -> Result<(), NodeError> {
        ConditionConfig::from_config("condition", config)
            .map(|_| ())
            .map_err(|e| NodeError::Configuration(e.to_string()))
    }
}

pub struct ConditionNodeFactory;

impl NodeFactory for ConditionNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(ConditionNode::from_spec(spec)?))
    }

    fn node_type(&self) -> &str {
        CONDITION_NODE_TYPE
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Select one outgoing branch from ordered, clause-guarded paths".to_string(),
            category: "control".to_string(),
            outputs: vec![
                PortDefinition::output("matched", "False when the else path was taken"),
                PortDefinition::output("pathId", "Id of the selected path"),
                PortDefinition::output("pathName", "Name of the selected path"),
            ],
        }
    }
}
