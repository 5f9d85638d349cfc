//! task-agent - Asana task console with LLM execution
//!
//! Browse Asana tasks in a full-screen terminal console, pick one, and hand
//! it to an LLM that returns a bundle of output files. Progress streams into
//! the console while the model works; the result lands on disk.
//!
//! # Modules
//!
//! - [`domain`] - WorkItem, ArtifactBundle, ExecutionOutcome
//! - [`providers`] - Provider registry (models, credentials, endpoints)
//! - [`config`] - Settings and their persistence
//! - [`tasks`] - Task source trait, asana-cli backend, search fallback
//! - [`engine`] - Execution engine trait and the HTTP LLM engine
//! - [`output`] - Writing artifact bundles to disk
//! - [`tui`] - The interactive console
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod output;
pub mod providers;
pub mod tasks;
pub mod tui;

// Re-export commonly used types
pub use config::{FileSettingsStore, Settings, SettingsStore};
pub use domain::{ArtifactBundle, ExecutionOutcome, OutputFile, Priority, WorkItem};
pub use engine::{EngineError, EngineTarget, ExecutionEngine, LlmEngine, PROGRESS_CAPACITY, ProgressReporter};
pub use output::{DirectoryOutput, OutputError, OutputSink};
pub use providers::{Provider, ProviderRegistry};
pub use tasks::{AsanaCli, SearchOutcome, SearchVia, TaskSource, TaskSourceError};
