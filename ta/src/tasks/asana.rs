//! asana-cli backed task source
//!
//! Shells out to the `asana-cli` binary with `--json` and decodes its
//! `{success, data, error}` envelope.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::{TaskSource, TaskSourceError};
use crate::domain::{Priority, WorkItem};

const BINARY_NAME: &str = "asana-cli";

/// Task source wrapping the asana-cli binary
#[derive(Debug, Clone)]
pub struct AsanaCli {
    program: PathBuf,
}

impl AsanaCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        debug!(?program, "AsanaCli::new: called");
        Self { program }
    }

    /// Find the binary: explicit path, then `PATH`, then the working directory
    pub fn locate(configured: Option<&Path>) -> Result<Self, TaskSourceError> {
        debug!(?configured, "AsanaCli::locate: called");
        if let Some(path) = configured {
            if path.is_file() {
                return Ok(Self::new(path));
            }
            debug!(?path, "AsanaCli::locate: configured path missing, searching");
        }

        if let Some(paths) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&paths) {
                let candidate = dir.join(BINARY_NAME);
                if candidate.is_file() {
                    info!("Using asana-cli at {}", candidate.display());
                    return Ok(Self::new(candidate));
                }
            }
        }

        let local = PathBuf::from(".").join(BINARY_NAME);
        if local.is_file() {
            return Ok(Self::new(local));
        }

        debug!("AsanaCli::locate: not found");
        Err(TaskSourceError::NotFound)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run a subcommand and return the envelope's `data`
    async fn run(&self, args: &[&str]) -> Result<serde_json::Value, TaskSourceError> {
        debug!(?args, "AsanaCli::run: called");
        let output = Command::new(&self.program)
            .args(args)
            .arg("--json")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TaskSourceError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(status = %output.status, %stderr, "AsanaCli::run: command failed");
            return Err(TaskSourceError::CommandFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        decode_envelope(&output.stdout)
    }
}

#[async_trait]
impl TaskSource for AsanaCli {
    async fn list_items(&self, project: Option<&str>) -> Result<Vec<WorkItem>, TaskSourceError> {
        debug!(?project, "AsanaCli::list_items: called");
        let mut args = vec!["list"];
        if let Some(project) = project.filter(|p| !p.is_empty()) {
            args.push(project);
        }
        let data = self.run(&args).await?;
        decode_items(data)
    }

    async fn search_items(&self, workspace: &str, query: &str) -> Result<Vec<WorkItem>, TaskSourceError> {
        debug!(%workspace, %query, "AsanaCli::search_items: called");
        let data = self.run(&["search", workspace, query]).await?;
        decode_items(data)
    }

    async fn get_item(&self, id: &str) -> Result<WorkItem, TaskSourceError> {
        debug!(%id, "AsanaCli::get_item: called");
        let data = self.run(&["view", id]).await?;
        let task: AsanaTask = serde_json::from_value(data)?;
        Ok(task.into())
    }

    async fn complete_item(&self, id: &str) -> Result<(), TaskSourceError> {
        debug!(%id, "AsanaCli::complete_item: called");
        self.run(&["complete", id]).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AsanaTask {
    id: String,
    gid: String,
    name: String,
    completed: bool,
    priority: Option<String>,
    due_date: Option<String>,
    notes: Option<String>,
    tags: Option<Vec<Named>>,
    assignee: Option<Named>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    name: String,
}

impl From<AsanaTask> for WorkItem {
    fn from(task: AsanaTask) -> Self {
        let id = if task.gid.is_empty() { task.id } else { task.gid };
        Self {
            id,
            name: task.name,
            completed: task.completed,
            priority: Priority::parse(task.priority.as_deref().unwrap_or("")),
            notes: task.notes.unwrap_or_default(),
            due: task
                .due_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            assignee: task.assignee.map(|a| a.name).filter(|n| !n.is_empty()),
            labels: task
                .tags
                .into_iter()
                .flatten()
                .map(|t| t.name)
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

fn decode_envelope(stdout: &[u8]) -> Result<serde_json::Value, TaskSourceError> {
    let envelope: Envelope = serde_json::from_slice(stdout)?;
    if !envelope.success {
        let error = if envelope.error.is_empty() {
            "request failed".to_string()
        } else {
            envelope.error
        };
        return Err(TaskSourceError::Remote(error));
    }
    Ok(envelope.data)
}

fn decode_items(data: serde_json::Value) -> Result<Vec<WorkItem>, TaskSourceError> {
    if data.is_null() {
        return Ok(Vec::new());
    }
    let tasks: Vec<AsanaTask> = serde_json::from_value(data)?;
    debug!(count = tasks.len(), "decode_items: decoded");
    Ok(tasks.into_iter().map(WorkItem::from).collect())
}
