//! Ordered, append-only execution log.

use crate::types::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Error,
}

/// One per-task outcome in an execution's log.
///
/// `task_id` is absent for run-level entries such as cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
}

/// Append-only record of per-task outcomes for one run.
///
/// Entry order is execution order. Timestamps are captured at append time
/// and clamped so they never decrease, even if the wall clock steps back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an info-level entry.
    pub fn info(&mut self, task_id: Option<TaskId>, message: impl Into<String>) {
        self.append(LogLevel::Info, task_id, message.into());
    }

    /// Append an error-level entry.
    pub fn error(&mut self, task_id: Option<TaskId>, message: impl Into<String>) {
        self.append(LogLevel::Error, task_id, message.into());
    }

    fn append(&mut self, level: LogLevel, task_id: Option<TaskId>, message: String) {
        let now = Utc::now();
        let timestamp = match self.entries.last() {
            Some(prev) if prev.timestamp > now => prev.timestamp,
            _ => now,
        };
        self.entries.push(LogEntry {
            task_id,
            message,
            timestamp,
            level,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries at the given level.
    pub fn count_level(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }
}
