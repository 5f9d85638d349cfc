//! WorkItem domain type
//!
//! A unit of work fetched from the task source. Items are immutable once
//! fetched and are replaced wholesale on every list or search.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Priority;

/// A task as shown in the console and handed to the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Source identifier (Asana gid)
    pub id: String,
    /// Display name
    pub name: String,
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    /// Free-text description
    #[serde(default)]
    pub notes: String,
    pub due: Option<NaiveDate>,
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl WorkItem {
    /// Create an incomplete item with only an id and name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            completed: false,
            priority: Priority::Unset,
            notes: String::new(),
            due: None,
            assignee: None,
            labels: BTreeSet::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Completion marker shown in lists
    pub fn status_icon(&self) -> &'static str {
        if self.completed { "✅" } else { "⏳" }
    }

    pub fn status_label(&self) -> &'static str {
        if self.completed { "Complete" } else { "Incomplete" }
    }

    /// Case-insensitive substring match over name and notes
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.notes.to_lowercase().contains(needle)
    }

    /// Render the plain-text (markdown) description sent to the engine
    pub fn to_task_description(&self) -> String {
        debug!(id = %self.id, "WorkItem::to_task_description: called");
        let mut out = String::new();
        let _ = writeln!(out, "# Task: {}\n", self.name);
        let _ = writeln!(out, "**ID:** {}", self.id);
        let _ = writeln!(out, "**Status:** {}", self.status_label());
        if self.priority.is_set() {
            let _ = writeln!(out, "**Priority:** {}", self.priority);
        }
        if let Some(due) = self.due {
            let _ = writeln!(out, "**Due:** {}", due.format("%Y-%m-%d"));
        }
        if let Some(assignee) = &self.assignee {
            let _ = writeln!(out, "**Assignee:** {}", assignee);
        }
        if !self.labels.is_empty() {
            let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
            let _ = writeln!(out, "**Tags:** {}", labels.join(", "));
        }
        if !self.notes.is_empty() {
            let _ = write!(out, "\n## Description\n\n{}\n", self.notes);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkItem {
        let mut item = WorkItem::new("1207", "Refactor parser")
            .with_notes("Split the lexer out")
            .with_priority(Priority::High);
        item.due = NaiveDate::from_ymd_opt(2026, 3, 1);
        item.assignee = Some("Dana".to_string());
        item.labels.insert("backend".to_string());
        item.labels.insert("api".to_string());
        item
    }

    #[test]
    fn test_task_description_full() {
        let text = sample().to_task_description();
        assert!(text.starts_with("# Task: Refactor parser\n\n**ID:** 1207\n"));
        assert!(text.contains("**Status:** Incomplete\n"));
        assert!(text.contains("**Priority:** high\n"));
        assert!(text.contains("**Due:** 2026-03-01\n"));
        assert!(text.contains("**Assignee:** Dana\n"));
        assert!(text.contains("**Tags:** api, backend\n"));
        assert!(text.ends_with("## Description\n\nSplit the lexer out\n"));
    }

    #[test]
    fn test_task_description_minimal() {
        let text = WorkItem::new("1", "Bare").to_task_description();
        assert!(!text.contains("Priority"));
        assert!(!text.contains("Description"));
    }

    #[test]
    fn test_matches_name_and_notes() {
        let item = sample();
        assert!(item.matches("refactor"));
        assert!(item.matches("lexer"));
        assert!(!item.matches("database"));
    }

    #[test]
    fn test_status_icon() {
        let mut item = WorkItem::new("1", "x");
        assert_eq!(item.status_icon(), "⏳");
        item.completed = true;
        assert_eq!(item.status_icon(), "✅");
    }
}
