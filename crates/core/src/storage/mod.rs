pub mod memory;

pub use memory::MemoryStore;

use crate::types::{Execution, ExecutionId, Workflow, WorkflowId, WorkflowStatus};
use anyhow::Result;

/// Cache hook a store calls after a successful commit.
///
/// Invalidation lives behind the storage seam so the engine's domain logic
/// never touches it. The default is a no-op.
pub trait CacheInvalidator: Send + Sync {
    fn workflow_changed(&self, id: WorkflowId);
    fn execution_changed(&self, id: ExecutionId);
}

/// Invalidator that does nothing; for deployments without a cache tier.
pub struct NoCache;

impl CacheInvalidator for NoCache {
    fn workflow_changed(&self, _id: WorkflowId) {}
    fn execution_changed(&self, _id: ExecutionId) {}
}

/// Workflow record access
#[async_trait::async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Get a workflow by id
    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>>;

    /// Create or replace a workflow record
    async fn put_workflow(&self, workflow: Workflow) -> Result<()>;

    /// Update only the status field (and the updated_at timestamp)
    async fn set_workflow_status(&self, id: WorkflowId, status: WorkflowStatus) -> Result<()>;

    /// List all workflows
    async fn list_workflows(&self) -> Result<Vec<Workflow>>;
}

/// Execution record access
#[async_trait::async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a freshly created execution
    async fn create_execution(&self, execution: Execution) -> Result<()>;

    /// Replace an execution record with a newer snapshot.
    ///
    /// The executor persists a full snapshot on every log append, so a
    /// concurrent reader always sees a log that matches the status field.
    async fn update_execution(&self, execution: Execution) -> Result<()>;

    /// Get an execution by id
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>>;

    /// List executions for a workflow
    async fn list_executions(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>>;
}
