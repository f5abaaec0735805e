use crate::workflow::log::ExecutionLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an execution (one run of a workflow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a task, unique within its workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of task types the product defines today.
///
/// Capability lookup is keyed on this enum, so adding a type means adding a
/// variant, a connection rule entry, and a provider registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Scraping,
    Summarization,
    Classification,
    Email,
}

impl TaskType {
    /// Config keys a task of this type cannot run without.
    ///
    /// A key counts as satisfied when the task's own config carries a
    /// non-empty value for it, or when an incoming connection's output
    /// mapping writes it before the task runs.
    pub fn required_config_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Scraping => &["url", "selectors"],
            Self::Summarization => &["input_text"],
            Self::Classification => &["image_url"],
            Self::Email => &["recipient", "subject", "body"],
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scraping => "scraping",
            Self::Summarization => "summarization",
            Self::Classification => "classification",
            Self::Email => "email",
        };
        write!(f, "{}", name)
    }
}

/// Free-form task configuration: config key to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfig(pub BTreeMap<String, serde_json::Value>);

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    /// Read a key as text. String values are returned as-is; other values
    /// are rendered to compact JSON, matching how upstream outputs that are
    /// not plain text flow into text-consuming config fields.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => serde_json::to_string(other).ok(),
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key)?.as_f64()
    }

    pub fn integer(&self, key: &str) -> Option<u64> {
        self.0.get(key)?.as_u64()
    }

    /// Read a key as a list of strings, ignoring non-string elements.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the key holds a usable value: present, non-null, and not an
    /// empty string or empty array.
    pub fn has_value(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

/// Canvas position of a task node. Layout metadata only; execution ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One unit of work of a fixed type with type-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub name: String,
    #[serde(default)]
    pub config: TaskConfig,
    #[serde(default)]
    pub position: Position,
}

/// Directed edge declaring that the source task's output feeds the target
/// task's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: TaskId,
    pub target: TaskId,
}

/// Status of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// A saved graph of tasks and connections, runnable zero or more times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: description.into(),
            tasks: Vec::new(),
            connections: Vec::new(),
            status: WorkflowStatus::Idle,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a task by id.
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}

/// One run of a workflow, with its own log and status.
///
/// Created in `running` state by the executor; mutated only by the run that
/// owns it; immutable after finalization. `completed_at` is non-null exactly
/// when the status is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub logs: ExecutionLog,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Running,
            logs: ExecutionLog::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> TaskConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_task_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskType::Summarization).unwrap(),
            "\"summarization\""
        );
        assert_eq!(TaskType::Scraping.to_string(), "scraping");
    }

    #[test]
    fn test_config_text_renders_non_strings() {
        let config = config(json!({
            "input_text": {"h1": ["Title"]},
            "subject": "Weekly digest",
        }));

        assert_eq!(config.text("subject").unwrap(), "Weekly digest");
        assert_eq!(config.text("input_text").unwrap(), r#"{"h1":["Title"]}"#);
        assert_eq!(config.text("missing"), None);
    }

    #[test]
    fn test_config_has_value_rejects_blank() {
        let config = config(json!({
            "url": "https://example.com",
            "subject": "  ",
            "selectors": [],
            "body": null,
        }));

        assert!(config.has_value("url"));
        assert!(!config.has_value("subject"));
        assert!(!config.has_value("selectors"));
        assert!(!config.has_value("body"));
        assert!(!config.has_value("recipient"));
    }

    #[test]
    fn test_config_string_list() {
        let config = config(json!({"selectors": ["h1", "p", 3]}));
        assert_eq!(config.string_list("selectors"), vec!["h1", "p"]);
        assert!(config.string_list("missing").is_empty());
    }
}
