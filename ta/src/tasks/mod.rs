//! Task source abstraction
//!
//! The console never talks to Asana directly; it goes through the
//! [`TaskSource`] trait so a missing or failing source degrades to an empty
//! list and local search instead of an error screen.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::WorkItem;

mod asana;

pub use asana::AsanaCli;

/// Errors from a task source
#[derive(Debug, Error)]
pub enum TaskSourceError {
    #[error("asana-cli not found in PATH or common locations")]
    NotFound,

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("asana-cli exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("asana-cli: {0}")]
    Remote(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("No workspace configured")]
    MissingWorkspace,
}

/// Remote source of work items
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// List items in a project, or the user's items when `project` is None
    async fn list_items(&self, project: Option<&str>) -> Result<Vec<WorkItem>, TaskSourceError>;

    /// Full-text search within a workspace
    async fn search_items(&self, workspace: &str, query: &str) -> Result<Vec<WorkItem>, TaskSourceError>;

    /// Fetch a single item by id
    async fn get_item(&self, id: &str) -> Result<WorkItem, TaskSourceError>;

    /// Mark an item complete
    async fn complete_item(&self, id: &str) -> Result<(), TaskSourceError>;
}

/// How a search result set was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchVia {
    /// Empty query, the full item set
    Unfiltered,
    /// The remote source answered
    Remote,
    /// Remote unavailable or failed; local substring filter used
    LocalFallback { reason: String },
}

/// Result of [`search_with_fallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub query: String,
    pub items: Vec<WorkItem>,
    pub via: SearchVia,
}

/// Case-insensitive substring filter over name and notes
pub fn local_filter(items: &[WorkItem], query: &str) -> Vec<WorkItem> {
    debug!(%query, count = items.len(), "local_filter: called");
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }
    items.iter().filter(|item| item.matches(&needle)).cloned().collect()
}

/// Search remotely, falling back to a local filter over `items`
///
/// Never fails: every path yields a result set.
pub async fn search_with_fallback(
    source: Option<Arc<dyn TaskSource>>,
    workspace: &str,
    query: &str,
    items: &[WorkItem],
) -> SearchOutcome {
    debug!(%workspace, %query, has_source = source.is_some(), "search_with_fallback: called");
    let query = query.trim().to_string();
    if query.is_empty() {
        debug!("search_with_fallback: empty query, unfiltered");
        return SearchOutcome {
            query,
            items: items.to_vec(),
            via: SearchVia::Unfiltered,
        };
    }

    let remote = match source {
        None => Err("no task source".to_string()),
        Some(_) if workspace.trim().is_empty() => Err(TaskSourceError::MissingWorkspace.to_string()),
        Some(source) => source.search_items(workspace, &query).await.map_err(|e| e.to_string()),
    };

    match remote {
        Ok(found) => {
            debug!(count = found.len(), "search_with_fallback: remote answered");
            SearchOutcome {
                query,
                items: found,
                via: SearchVia::Remote,
            }
        }
        Err(reason) => {
            warn!(%reason, "Remote search unavailable, filtering locally");
            SearchOutcome {
                items: local_filter(items, &query),
                query,
                via: SearchVia::LocalFallback { reason },
            }
        }
    }
}
