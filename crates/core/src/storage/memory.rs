use super::{CacheInvalidator, ExecutionStore, WorkflowStore};
use crate::types::{Execution, ExecutionId, Workflow, WorkflowId, WorkflowStatus};
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store for tests and single-process deployments.
///
/// Also the reference for how a persistent store should behave: snapshots
/// replaced whole, and the cache invalidator called only after a commit.
#[derive(Default)]
pub struct MemoryStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    executions: RwLock<HashMap<ExecutionId, Execution>>,
    invalidator: Option<Arc<dyn CacheInvalidator>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cache invalidator, called after each successful commit.
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    fn workflow_committed(&self, id: WorkflowId) {
        if let Some(invalidator) = &self.invalidator {
            invalidator.workflow_changed(id);
        }
    }

    fn execution_committed(&self, id: ExecutionId) {
        if let Some(invalidator) = &self.invalidator {
            invalidator.execution_changed(id);
        }
    }
}

#[async_trait::async_trait]
impl WorkflowStore for MemoryStore {
    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn put_workflow(&self, workflow: Workflow) -> Result<()> {
        let id = workflow.id;
        self.workflows.write().await.insert(id, workflow);
        self.workflow_committed(id);
        Ok(())
    }

    async fn set_workflow_status(&self, id: WorkflowId, status: WorkflowStatus) -> Result<()> {
        {
            let mut workflows = self.workflows.write().await;
            let workflow = workflows
                .get_mut(&id)
                .ok_or_else(|| anyhow!("workflow {} not found", id))?;
            workflow.status = status;
            workflow.updated_at = Utc::now();
        }
        self.workflow_committed(id);
        Ok(())
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let mut workflows: Vec<_> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by_key(|w| w.created_at);
        Ok(workflows)
    }
}

#[async_trait::async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, execution: Execution) -> Result<()> {
        let id = execution.id;
        self.executions.write().await.insert(id, execution);
        self.execution_committed(id);
        Ok(())
    }

    async fn update_execution(&self, execution: Execution) -> Result<()> {
        let id = execution.id;
        {
            let mut executions = self.executions.write().await;
            if !executions.contains_key(&id) {
                return Err(anyhow!("execution {} not found", id));
            }
            executions.insert(id, execution);
        }
        self.execution_committed(id);
        Ok(())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>> {
        Ok(self.executions.read().await.get(&id).cloned())
    }

    async fn list_executions(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>> {
        let mut executions: Vec<_> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.started_at);
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingInvalidator {
        workflow_hits: AtomicUsize,
        execution_hits: AtomicUsize,
    }

    impl CacheInvalidator for CountingInvalidator {
        fn workflow_changed(&self, _id: WorkflowId) {
            self.workflow_hits.fetch_add(1, Ordering::SeqCst);
        }

        fn execution_changed(&self, _id: ExecutionId) {
            self.execution_hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_workflow_round_trip() {
        let store = MemoryStore::new();
        let workflow = Workflow::new("digest", "");
        let id = workflow.id;

        store.put_workflow(workflow).await.unwrap();
        store
            .set_workflow_status(id, WorkflowStatus::Running)
            .await
            .unwrap();

        let loaded = store.get_workflow(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Running);
        assert!(loaded.updated_at >= loaded.created_at);
    }

    #[tokio::test]
    async fn test_update_requires_existing_execution() {
        let store = MemoryStore::new();
        let execution = Execution::new(WorkflowId::new());

        assert!(store.update_execution(execution.clone()).await.is_err());
        store.create_execution(execution.clone()).await.unwrap();
        assert!(store.update_execution(execution).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalidator_fires_after_commit() {
        let invalidator = Arc::new(CountingInvalidator {
            workflow_hits: AtomicUsize::new(0),
            execution_hits: AtomicUsize::new(0),
        });
        let store = MemoryStore::new().with_invalidator(invalidator.clone());

        let workflow = Workflow::new("digest", "");
        let workflow_id = workflow.id;
        store.put_workflow(workflow).await.unwrap();
        store
            .set_workflow_status(workflow_id, WorkflowStatus::Completed)
            .await
            .unwrap();
        store
            .create_execution(Execution::new(workflow_id))
            .await
            .unwrap();

        assert_eq!(invalidator.workflow_hits.load(Ordering::SeqCst), 2);
        assert_eq!(invalidator.execution_hits.load(Ordering::SeqCst), 1);

        // A failed commit must not invalidate.
        let missing = Execution::new(workflow_id);
        let _ = store.update_execution(missing).await;
        assert_eq!(invalidator.execution_hits.load(Ordering::SeqCst), 1);
    }
}
