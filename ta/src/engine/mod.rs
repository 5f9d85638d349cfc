//! Execution engine module
//!
//! An [`ExecutionEngine`] turns a task description into an
//! [`ArtifactBundle`], reporting progress through a bounded channel while it
//! works. The channel closes when the [`ProgressReporter`] is dropped, which
//! is the only end-of-stream signal the console relies on.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::ArtifactBundle;
use crate::providers::Provider;

mod error;
mod llm;
mod parse;

pub use error::EngineError;
pub use llm::LlmEngine;
pub use parse::parse_bundle;

/// Capacity of the progress channel
pub const PROGRESS_CAPACITY: usize = 64;

/// Provider, model and credential for one execution
#[derive(Debug, Clone)]
pub struct EngineTarget {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
}

/// Sending half of the progress channel
///
/// Not `Clone`: the channel closes when this one reporter is dropped.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: mpsc::Sender<String>,
}

impl ProgressReporter {
    /// Create a reporter and its receiving half
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        debug!(capacity, "ProgressReporter::channel: called");
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Send one progress message, waiting for room in the channel
    pub async fn report(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "ProgressReporter::report: called");
        if self.tx.send(message).await.is_err() {
            debug!("ProgressReporter::report: receiver dropped");
        }
    }
}

/// Executes one task against a provider
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(
        &self,
        target: &EngineTarget,
        task_description: &str,
        progress: &ProgressReporter,
    ) -> Result<ArtifactBundle, EngineError>;
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Scripted engine for unit tests
    pub struct MockEngine {
        messages: Vec<String>,
        result: Mutex<Option<Result<ArtifactBundle, EngineError>>>,
        delay: Option<Duration>,
        call_count: AtomicUsize,
        pub descriptions: Mutex<Vec<String>>,
    }

    impl MockEngine {
        pub fn new(messages: &[&str], result: Result<ArtifactBundle, EngineError>) -> Self {
            Self {
                messages: messages.iter().map(|m| m.to_string()).collect(),
                result: Mutex::new(Some(result)),
                delay: None,
                call_count: AtomicUsize::new(0),
                descriptions: Mutex::new(Vec::new()),
            }
        }

        /// Sleep between messages so callers can observe an in-flight state
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExecutionEngine for MockEngine {
        async fn execute(
            &self,
            _target: &EngineTarget,
            task_description: &str,
            progress: &ProgressReporter,
        ) -> Result<ArtifactBundle, EngineError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.descriptions.lock().unwrap().push(task_description.to_string());
            for message in &self.messages {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                progress.report(message.clone()).await;
            }
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(EngineError::InvalidResponse("No more mock results".to_string())))
        }
    }
}
