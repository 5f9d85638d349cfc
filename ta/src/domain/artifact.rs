//! Execution results
//!
//! The engine returns an [`ArtifactBundle`]; the console turns that plus the
//! output sink's result into exactly one [`ExecutionOutcome`] per execution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One generated file, path relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
}

/// Structured result of one engine run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    /// "markdown", "code_folder" or "mixed"
    #[serde(default = "default_output_type")]
    pub output_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub files: Vec<OutputFile>,
    #[serde(default)]
    pub notes: String,
}

fn default_output_type() -> String {
    "markdown".to_string()
}

impl Default for ArtifactBundle {
    fn default() -> Self {
        Self {
            output_type: default_output_type(),
            summary: String::new(),
            files: Vec::new(),
            notes: String::new(),
        }
    }
}

impl ArtifactBundle {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Terminal result of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Engine succeeded and the bundle was persisted at `output_path`
    Completed { bundle: ArtifactBundle, output_path: PathBuf },
    /// Engine succeeded but persisting the bundle failed
    WriteFailed { bundle: ArtifactBundle, error: String },
    /// Engine failed
    Failed { error: String },
}

impl ExecutionOutcome {
    pub fn bundle(&self) -> Option<&ArtifactBundle> {
        match self {
            Self::Completed { bundle, .. } | Self::WriteFailed { bundle, .. } => Some(bundle),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
