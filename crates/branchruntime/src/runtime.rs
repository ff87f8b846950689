use crate::{registry::NodeRegistry, ExecutionResult, WorkflowExecutor};
use branchcore::{EventBus, ExecutionEvent, FlowError, Value, Workflow, WorkflowError, WorkflowId};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Main runtime for executing workflows
pub struct BranchRuntime {
    registry: Arc<NodeRegistry>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
    config: RuntimeConfig,
}

impl BranchRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(NodeRegistry::new()), config)
    }

    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            executor: Arc::new(WorkflowExecutor::new()),
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            workflows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Read a workflow definition from a JSON file
    pub async fn load_workflow(path: impl AsRef<std::path::Path>) -> Result<Workflow, FlowError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Register a workflow
    pub async fn register_workflow(&self, workflow: Workflow) -> WorkflowId {
        let id = workflow.id;
        self.workflows.write().await.insert(id, workflow);
        id
    }

    /// Execute a registered workflow by id
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        input: Value,
    ) -> Result<ExecutionResult, FlowError> {
        let workflow = self
            .workflows
            .read()
            .await
            .get(&workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;

        self.execute(&workflow, input).await
    }

    /// Execute a workflow directly (without registration)
    pub async fn execute(&self, workflow: &Workflow, input: Value) -> Result<ExecutionResult, FlowError> {
        self.execute_with_cancellation(workflow, input, CancellationToken::new())
            .await
    }

    /// Execute a workflow that stops before its next node once `cancellation`
    /// fires.
    pub async fn execute_with_cancellation(
        &self,
        workflow: &Workflow,
        input: Value,
        cancellation: CancellationToken,
    ) -> Result<ExecutionResult, FlowError> {
        self.executor
            .execute(workflow, &self.registry, &self.event_bus, input, cancellation)
            .await
    }

    /// Run the same workflow once per input, at most `max_concurrent_runs`
    /// at a time. Each run has its own graph and outputs. Results come back
    /// in input order.
    pub async fn execute_batch(
        &self,
        workflow: &Workflow,
        inputs: Vec<Value>,
    ) -> Vec<Result<ExecutionResult, FlowError>> {
        let limit = self.config.max_concurrent_runs.max(1);
        stream::iter(inputs)
            .map(|input| self.execute(workflow, input))
            .buffered(limit)
            .collect()
            .await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for BranchRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the broadcast channel behind the event bus
    pub event_buffer_size: usize,
    /// Upper bound on concurrent runs in [`BranchRuntime::execute_batch`]
    pub max_concurrent_runs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            max_concurrent_runs: 10,
        }
    }
}
