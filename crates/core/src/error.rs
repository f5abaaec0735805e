//! Error types for the Pipeweld engine.

use crate::types::{ExecutionId, TaskId, TaskType, WorkflowId};

/// Ways a task graph can be malformed.
///
/// Surfaced before any capability is invoked, so a rejected graph never
/// produces partial side effects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A connection endpoint does not name a task in the workflow.
    #[error("connection references unknown task {task_id}")]
    UnknownTask { task_id: TaskId },

    /// The (source type, target type) pair is not allowed by the rule table.
    #[error("tasks of type {source_type} cannot feed tasks of type {target_type}")]
    InvalidConnection {
        source_type: TaskType,
        target_type: TaskType,
    },

    /// The connection set contains a cycle; workflows must be DAGs.
    #[error("workflow connections form a cycle")]
    CyclicGraph,

    /// A required config key is neither set on the task nor supplied by an
    /// incoming connection's output mapping.
    #[error("task {task_id} is missing required config key {key:?}")]
    MissingConfig { task_id: TaskId, key: String },

    /// Two or more incoming connections write the same config key of one
    /// task. Rejected outright instead of letting declaration order decide.
    #[error("task {task_id} receives config key {key:?} from more than one connection")]
    ConflictingInputs { task_id: TaskId, key: String },
}

/// Failure reported by a capability provider.
///
/// Transport-agnostic on purpose: providers map their library errors into
/// these variants so the engine never depends on provider internals.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// A required input field is missing or blank.
    #[error("required field {field:?} is empty")]
    EmptyInput { field: &'static str },

    /// The provider itself is misconfigured (bad endpoint, bad sender
    /// address), as opposed to a bad task config.
    #[error("invalid capability configuration: {0}")]
    InvalidConfig(String),

    /// Network-level failure reaching the external service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The external service answered with a non-success status.
    #[error("endpoint returned status {status}: {message}")]
    Endpoint { status: u16, message: String },

    /// The external service answered 2xx but the body was not usable.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A scraping selector failed to parse.
    #[error("invalid selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },

    /// A recipient or sender address failed to parse.
    #[error("invalid address {address:?}: {message}")]
    InvalidAddress { address: String, message: String },

    /// Message delivery failed (SMTP transport, auth, connection).
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Errors surfaced by the execution engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No workflow record exists for the id.
    #[error("workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    /// The workflow already has a run in flight; at most one is allowed.
    #[error("workflow {0} already has a run in flight")]
    AlreadyRunning(WorkflowId),

    /// The task graph failed validation; no execution record was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A task references a type with no registered capability provider.
    #[error("no capability provider registered for task type {task_type}")]
    UnsupportedTaskType { task_type: TaskType },

    /// A capability failed during an ad-hoc single-task invocation.
    #[error("{task_type} capability failed: {source}")]
    Capability {
        task_type: TaskType,
        #[source]
        source: CapabilityError,
    },

    /// A capability failed while running a task inside a workflow run.
    #[error("task {task_id} ({task_type}) failed: {source}")]
    TaskExecution {
        task_id: TaskId,
        task_type: TaskType,
        #[source]
        source: CapabilityError,
    },

    /// The run was stopped externally before it could finish.
    #[error("execution cancelled")]
    Cancelled,

    /// No active run exists for the execution id.
    #[error("execution {0} is not active")]
    ExecutionNotActive(ExecutionId),

    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
