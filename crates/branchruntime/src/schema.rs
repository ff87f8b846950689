//! Output fields produced by each node type.

use crate::registry::NodeRegistry;
use branchcore::{NodeSpec, CONDITION_NODE_TYPE};
use std::collections::HashMap;

/// Declared output fields of a node type.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSchema {
    /// Always the same fields.
    Fixed(Vec<String>),
    /// Fields depend on a subtype chosen in the node's config.
    BySubtype {
        config_key: String,
        variants: HashMap<String, Vec<String>>,
        default: String,
    },
    /// Fields are only known after execution (pass-through nodes).
    Dynamic,
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Lookup table from node type to [`OutputSchema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, OutputSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schemas of the node kinds the editor ships, including integration
    /// nodes whose adapters live outside this workspace.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();

        let mut input_variants = HashMap::new();
        for subtype in ["text", "image", "json"] {
            input_variants.insert(subtype.to_string(), vec![subtype.to_string()]);
        }
        registry.register(
            "input",
            OutputSchema::BySubtype {
                config_key: "inputType".to_string(),
                variants: input_variants,
                default: "text".to_string(),
            },
        );
        registry.register(
            "ai",
            OutputSchema::Fixed(fields(&["response", "output", "content", "prompt_tokens"])),
        );
        registry.register(
            CONDITION_NODE_TYPE,
            OutputSchema::Fixed(fields(&["matched", "pathId", "pathName"])),
        );
        registry.register("text", OutputSchema::Fixed(fields(&["text"])));
        registry.register("output", OutputSchema::Fixed(fields(&["output"])));
        registry.register("slack", OutputSchema::Fixed(fields(&["ok", "channel", "ts"])));
        registry.register("notion", OutputSchema::Fixed(fields(&["id", "url"])));
        registry.register("jira", OutputSchema::Fixed(fields(&["id", "key", "self"])));
        registry.register("zoom", OutputSchema::Fixed(fields(&["id", "join_url", "start_url"])));
        registry
    }

    /// Built-in table, completed with the output ports declared by every
    /// registered factory. Built-in entries win.
    pub fn from_node_registry(nodes: &NodeRegistry) -> Self {
        let mut registry = Self::with_builtin();
        for node_type in nodes.list_node_types() {
            if registry.schemas.contains_key(&node_type) {
                continue;
            }
            let schema = match nodes.get_metadata(&node_type) {
                Some(metadata) if !metadata.outputs.is_empty() => {
                    OutputSchema::Fixed(metadata.outputs.into_iter().map(|p| p.name).collect())
                }
                _ => OutputSchema::Dynamic,
            };
            registry.register(node_type, schema);
        }
        registry
    }

    pub fn register(&mut self, node_type: impl Into<String>, schema: OutputSchema) {
        self.schemas.insert(node_type.into(), schema);
    }

    pub fn get(&self, node_type: &str) -> Option<&OutputSchema> {
        self.schemas.get(node_type)
    }

    /// Output fields a configured node will produce, or `None` when they
    /// cannot be known before execution.
    pub fn fields_for(&self, spec: &NodeSpec) -> Option<Vec<String>> {
        let mut out = match self.schemas.get(&spec.node_type)? {
            OutputSchema::Fixed(names) => names.clone(),
            OutputSchema::BySubtype {
                config_key,
                variants,
                default,
            } => {
                let subtype = spec
                    .config
                    .get(config_key)
                    .and_then(|v| v.as_str())
                    .unwrap_or(default);
                variants
                    .get(subtype)
                    .or_else(|| variants.get(default))
                    .cloned()
                    .unwrap_or_default()
            }
            OutputSchema::Dynamic => return None,
        };

        if spec.node_type == CONDITION_NODE_TYPE {
            if let Some(name) = spec.config.get("variableName").and_then(|v| v.as_str()) {
                if !name.is_empty() {
                    out.push(name.to_string());
                }
            }
        }
        Some(out)
    }
}
