//! Static connection policy: which task types may feed which, and where the
//! output lands in the target's config.

use crate::types::TaskType;
use std::collections::{HashMap, HashSet};

/// Policy for one source task type.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRule {
    valid_targets: HashSet<TaskType>,
    output_mapping: HashMap<TaskType, String>,
}

impl ConnectionRule {
    /// Allow this source type to feed `target`, writing its output into the
    /// target's `config_key`.
    pub fn feeds(mut self, target: TaskType, config_key: &str) -> Self {
        self.valid_targets.insert(target);
        self.output_mapping.insert(target, config_key.to_string());
        self
    }
}

/// The connection rule table. Pure data; the engine only performs lookups,
/// so a new task type needs a new entry here and nothing else.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRules {
    rules: HashMap<TaskType, ConnectionRule>,
}

impl ConnectionRules {
    /// An empty table that rejects every connection.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table the product defines today.
    pub fn builtin() -> Self {
        let mut rules = Self::default();
        rules.insert(
            TaskType::Scraping,
            ConnectionRule::default()
                .feeds(TaskType::Summarization, "input_text")
                .feeds(TaskType::Email, "body"),
        );
        rules.insert(
            TaskType::Classification,
            ConnectionRule::default().feeds(TaskType::Email, "body"),
        );
        rules.insert(
            TaskType::Summarization,
            ConnectionRule::default().feeds(TaskType::Email, "body"),
        );
        rules.insert(TaskType::Email, ConnectionRule::default());
        rules
    }

    /// Add or replace the rule for a source type.
    pub fn insert(&mut self, source: TaskType, rule: ConnectionRule) {
        self.rules.insert(source, rule);
    }

    /// Whether `source` may feed `target`.
    pub fn is_valid(&self, source: TaskType, target: TaskType) -> bool {
        self.rules
            .get(&source)
            .is_some_and(|rule| rule.valid_targets.contains(&target))
    }

    /// The target config key that receives `source`'s output.
    pub fn output_key(&self, source: TaskType, target: TaskType) -> Option<&str> {
        self.rules
            .get(&source)?
            .output_mapping
            .get(&target)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_matches_product_policy() {
        let rules = ConnectionRules::builtin();

        assert!(rules.is_valid(TaskType::Scraping, TaskType::Summarization));
        assert!(rules.is_valid(TaskType::Scraping, TaskType::Email));
        assert!(rules.is_valid(TaskType::Classification, TaskType::Email));
        assert!(rules.is_valid(TaskType::Summarization, TaskType::Email));

        assert!(!rules.is_valid(TaskType::Email, TaskType::Scraping));
        assert!(!rules.is_valid(TaskType::Summarization, TaskType::Scraping));
        assert!(!rules.is_valid(TaskType::Classification, TaskType::Summarization));
    }

    #[test]
    fn test_builtin_output_mapping() {
        let rules = ConnectionRules::builtin();

        assert_eq!(
            rules.output_key(TaskType::Scraping, TaskType::Summarization),
            Some("input_text")
        );
        assert_eq!(
            rules.output_key(TaskType::Scraping, TaskType::Email),
            Some("body")
        );
        assert_eq!(
            rules.output_key(TaskType::Summarization, TaskType::Email),
            Some("body")
        );
        assert_eq!(rules.output_key(TaskType::Email, TaskType::Scraping), None);
    }

    #[test]
    fn test_table_is_extensible() {
        let mut rules = ConnectionRules::builtin();
        rules.insert(
            TaskType::Classification,
            ConnectionRule::default()
                .feeds(TaskType::Email, "body")
                .feeds(TaskType::Summarization, "input_text"),
        );

        assert!(rules.is_valid(TaskType::Classification, TaskType::Summarization));
        assert_eq!(
            rules.output_key(TaskType::Classification, TaskType::Summarization),
            Some("input_text")
        );
    }
}
