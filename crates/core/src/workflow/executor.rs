use super::graph::TaskGraph;
use crate::capability::{CapabilityOutput, CapabilityRegistry};
use crate::error::EngineError;
use crate::rules::ConnectionRules;
use crate::storage::{ExecutionStore, WorkflowStore};
use crate::types::{
    Execution, ExecutionId, ExecutionStatus, Task, TaskConfig, TaskId, TaskType, Workflow,
    WorkflowId, WorkflowStatus,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Coordinates one workflow run: validates the graph, orders execution,
/// routes outputs into downstream configs, invokes capabilities, and
/// finalizes statuses.
///
/// Each run's execution record has a single writer (the run itself), so a
/// concurrent reader polling the store always sees a log snapshot that
/// matches the status field.
#[derive(Clone)]
pub struct WorkflowExecutor {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    registry: Arc<CapabilityRegistry>,
    rules: ConnectionRules,
    // Track active runs for cancellation
    active_runs: Arc<RwLock<HashMap<ExecutionId, watch::Sender<bool>>>>,
}

/// A run that passed validation and has its execution record created.
struct PreparedRun {
    workflow: Workflow,
    order: Vec<Task>,
    execution: Execution,
    cancel_rx: watch::Receiver<bool>,
}

impl WorkflowExecutor {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self {
            workflows,
            executions,
            registry,
            rules: ConnectionRules::builtin(),
            active_runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the builtin connection rule table.
    pub fn with_rules(mut self, rules: ConnectionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Start a run and return immediately with its execution id.
    ///
    /// Validation failures propagate to the caller and leave no execution
    /// record behind; the caller polls the store for status and logs.
    pub async fn start_run(&self, workflow_id: WorkflowId) -> Result<ExecutionId, EngineError> {
        let prepared = self.prepare(workflow_id).await?;
        let execution_id = prepared.execution.id;

        let runner = self.clone();
        tokio::spawn(async move {
            runner.drive(prepared).await;
        });

        Ok(execution_id)
    }

    /// Run a workflow and wait for the final execution record.
    ///
    /// A failed run is a normal outcome here: the error cause lives in the
    /// returned execution's log, per the status-plus-log contract.
    pub async fn run_to_completion(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Execution, EngineError> {
        let prepared = self.prepare(workflow_id).await?;
        Ok(self.clone().drive(prepared).await)
    }

    /// Invoke a single capability outside any workflow, without touching
    /// storage. Used for interactive "run this node now" checks.
    pub async fn execute_single_task(
        &self,
        task_type: TaskType,
        config: &TaskConfig,
    ) -> Result<CapabilityOutput, EngineError> {
        self.registry.invoke(task_type, config).await
    }

    /// Signal a running execution to stop.
    ///
    /// The run notices at its next suspension point, appends a cancellation
    /// log entry, and finalizes as failed; it is never left `running`.
    pub async fn cancel(&self, execution_id: ExecutionId) -> Result<(), EngineError> {
        let active_runs = self.active_runs.read().await;
        let cancel_tx = active_runs
            .get(&execution_id)
            .ok_or(EngineError::ExecutionNotActive(execution_id))?;
        cancel_tx.send(true).ok();
        tracing::info!(%execution_id, "cancellation signal sent");
        Ok(())
    }

    /// Validate and set up a run: graph checks first, then the execution
    /// record and the workflow status flip to running.
    async fn prepare(&self, workflow_id: WorkflowId) -> Result<PreparedRun, EngineError> {
        let workflow = self
            .workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        // At most one in-flight run per workflow.
        if workflow.status == WorkflowStatus::Running {
            return Err(EngineError::AlreadyRunning(workflow_id));
        }

        let graph = TaskGraph::build(&workflow.tasks, &workflow.connections, &self.rules)?;
        let order = graph.execution_order();

        let execution = Execution::new(workflow_id);
        self.executions.create_execution(execution.clone()).await?;
        self.workflows
            .set_workflow_status(workflow_id, WorkflowStatus::Running)
            .await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.active_runs
            .write()
            .await
            .insert(execution.id, cancel_tx);

        tracing::info!(%workflow_id, execution_id = %execution.id, "run started");

        Ok(PreparedRun {
            workflow,
            order,
            execution,
            cancel_rx,
        })
    }

    /// Execute the prepared run to its terminal state.
    async fn drive(self, prepared: PreparedRun) -> Execution {
        let PreparedRun {
            workflow,
            order,
            mut execution,
            mut cancel_rx,
        } = prepared;

        let mut outputs: HashMap<TaskId, serde_json::Value> = HashMap::new();
        let mut failed = false;

        for task in &order {
            let config = self.effective_config(task, &workflow, &outputs);

            let invoked = tokio::select! {
                // Only `true` is ever sent; any wake here means cancel.
                _ = cancel_rx.changed() => Err(EngineError::Cancelled),
                result = self.invoke_task(task, &config) => result,
            };

            match invoked {
                Ok(output) => {
                    execution
                        .logs
                        .info(Some(task.id.clone()), format!("Task completed: {}", output.render()));
                    outputs.insert(task.id.clone(), output.to_value());
                    self.persist_snapshot(&execution).await;
                }
                Err(EngineError::Cancelled) => {
                    tracing::warn!(execution_id = %execution.id, "run cancelled");
                    execution.logs.error(None, "Execution cancelled");
                    failed = true;
                    self.persist_snapshot(&execution).await;
                    break;
                }
                Err(error) => {
                    tracing::error!(
                        execution_id = %execution.id,
                        task_id = %task.id,
                        %error,
                        "task failed, aborting run"
                    );
                    execution.logs.error(Some(task.id.clone()), error.to_string());
                    failed = true;
                    self.persist_snapshot(&execution).await;
                    break;
                }
            }
        }

        self.finalize(&workflow, &mut execution, failed).await;
        execution
    }

    /// Resolve the config a task actually runs with: its own config overlaid
    /// with upstream outputs at the rule table's mapped keys. Connections
    /// are applied in declaration order; validation already rejected graphs
    /// where two connections write the same key.
    fn effective_config(
        &self,
        task: &Task,
        workflow: &Workflow,
        outputs: &HashMap<TaskId, serde_json::Value>,
    ) -> TaskConfig {
        let mut config = task.config.clone();

        for connection in workflow.connections.iter().filter(|c| c.target == task.id) {
            let Some(value) = outputs.get(&connection.source) else {
                continue;
            };
            let Some(source) = workflow.task(&connection.source) else {
                continue;
            };
            if let Some(key) = self.rules.output_key(source.task_type, task.task_type) {
                config.insert(key, value.clone());
            }
        }

        config
    }

    async fn invoke_task(
        &self,
        task: &Task,
        config: &TaskConfig,
    ) -> Result<CapabilityOutput, EngineError> {
        tracing::info!(task_id = %task.id, task_type = %task.task_type, "executing task");

        match self.registry.invoke(task.task_type, config).await {
            Ok(output) => Ok(output),
            // Attach the task id so the failure reads as a run event.
            Err(EngineError::Capability { task_type, source }) => Err(EngineError::TaskExecution {
                task_id: task.id.clone(),
                task_type,
                source,
            }),
            Err(other) => Err(other),
        }
    }

    /// Persist a mid-run snapshot so a live poller sees partial logs.
    async fn persist_snapshot(&self, execution: &Execution) {
        if let Err(error) = self.executions.update_execution(execution.clone()).await {
            tracing::error!(execution_id = %execution.id, %error, "failed to persist snapshot");
        }
    }

    /// Set terminal statuses and `completed_at`, persist once, and drop the
    /// cancellation handle.
    async fn finalize(&self, workflow: &Workflow, execution: &mut Execution, failed: bool) {
        execution.status = if failed {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        execution.completed_at = Some(Utc::now());

        let workflow_status = if failed {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Completed
        };

        self.persist_snapshot(execution).await;
        if let Err(error) = self
            .workflows
            .set_workflow_status(workflow.id, workflow_status)
            .await
        {
            tracing::error!(workflow_id = %workflow.id, %error, "failed to persist workflow status");
        }

        self.active_runs.write().await.remove(&execution.id);

        if failed {
            tracing::error!(execution_id = %execution.id, "run failed");
        } else {
            tracing::info!(execution_id = %execution.id, "run completed");
        }
    }
}
