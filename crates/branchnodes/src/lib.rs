//! Standard node library
//!
//! Built-in nodes: the condition router plus the input, text, output,
//! debug, transform and delay nodes used around it.

mod condition;
mod debug;
mod input;
mod text;
mod time;
mod transform;

pub use condition::{ConditionNode, ConditionNodeFactory};
pub use debug::DebugNode;
pub use input::InputNode;
pub use text::{OutputNode, TextNode};
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode};
use branchruntime::NodeRegistry;

use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(condition::ConditionNodeFactory));
    registry.register(Arc::new(input::InputNodeFactory));
    registry.register(Arc::new(text::TextNodeFactory));
    registry.register(Arc::new(text::OutputNodeFactory));
    registry.register(Arc::new(debug::DebugNodeFactory));
    registry.register(Arc::new(transform::JsonParseNodeFactory));
    registry.register(Arc::new(transform::JsonStringifyNodeFactory));
    registry.register(Arc::new(time::DelayNodeFactory));
}

/// A registry with every standard node registered.
pub fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    registry
}
