//! Execution controller
//!
//! Runs at most one engine job at a time on a spawned task. Progress flows
//! back over a bounded channel and the terminal outcome over a oneshot that
//! is only read once the progress channel has closed, so every progress
//! message is delivered before the outcome.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::{ExecutionOutcome, WorkItem};
use crate::engine::{EngineTarget, ExecutionEngine, PROGRESS_CAPACITY, ProgressReporter};
use crate::output::OutputSink;
use crate::providers::ProviderRegistry;

/// Reasons an execution is refused before any background work starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("An execution is already in progress")]
    AlreadyRunning,

    #[error("Missing API key for {provider}: set {env_key} or add it in settings (press c)")]
    MissingCredential { provider: String, env_key: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

/// Everything one execution needs, copied out of the settings at start
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub item: WorkItem,
    pub target: EngineTarget,
    pub output_dir: PathBuf,
}

impl ExecutionRequest {
    /// Build a request, checking provider and credential up front
    pub fn from_settings(
        item: WorkItem,
        settings: &Settings,
        registry: &ProviderRegistry,
    ) -> Result<Self, ExecutionError> {
        debug!(id = %item.id, provider = %settings.provider, "ExecutionRequest::from_settings: called");
        let provider = registry
            .get(&settings.provider)
            .ok_or_else(|| ExecutionError::UnknownProvider(settings.provider.clone()))?;

        let api_key = settings.api_key(provider);
        if let Some(env_key) = &provider.env_key
            && api_key.is_none()
        {
            return Err(ExecutionError::MissingCredential {
                provider: provider.name.clone(),
                env_key: env_key.clone(),
            });
        }

        let model = if provider.has_model(&settings.model) {
            settings.model.clone()
        } else {
            provider.default_model.clone()
        };

        Ok(Self {
            item,
            target: EngineTarget {
                provider: provider.clone(),
                model,
                api_key,
            },
            output_dir: settings.output_dir.clone(),
        })
    }
}

/// Message delivered to the event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMessage {
    Progress(String),
    Finished(ExecutionOutcome),
}

struct Running {
    /// None once the channel has closed
    progress_rx: Option<mpsc::Receiver<String>>,
    outcome_rx: oneshot::Receiver<ExecutionOutcome>,
}

/// Owns the single in-flight execution
pub struct ExecutionController {
    engine: Arc<dyn ExecutionEngine>,
    output: Arc<dyn OutputSink>,
    running: Option<Running>,
}

impl ExecutionController {
    pub fn new(engine: Arc<dyn ExecutionEngine>, output: Arc<dyn OutputSink>) -> Self {
        debug!("ExecutionController::new: called");
        Self {
            engine,
            output,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn the engine for `request`
    pub fn start(&mut self, request: ExecutionRequest) -> Result<(), ExecutionError> {
        debug!(id = %request.item.id, "ExecutionController::start: called");
        if self.running.is_some() {
            debug!("ExecutionController::start: already running");
            return Err(ExecutionError::AlreadyRunning);
        }

        let (reporter, progress_rx) = ProgressReporter::channel(PROGRESS_CAPACITY);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let engine = self.engine.clone();
        let output = self.output.clone();

        info!(
            id = %request.item.id,
            provider = %request.target.provider.id,
            model = %request.target.model,
            "Starting execution"
        );
        tokio::spawn(async move {
            let ExecutionRequest {
                item,
                target,
                output_dir,
            } = request;
            let description = item.to_task_description();
            let result = engine.execute(&target, &description, &reporter).await;
            // Closes the progress channel
            drop(reporter);

            let outcome = match result {
                Err(e) => {
                    warn!(error = %e, "Engine failed");
                    ExecutionOutcome::Failed { error: e.to_string() }
                }
                Ok(bundle) => {
                    let persisted = tokio::task::spawn_blocking(move || {
                        let result = output.persist(&bundle, &item, &output_dir);
                        (bundle, result)
                    })
                    .await;
                    match persisted {
                        Ok((bundle, Ok(output_path))) => ExecutionOutcome::Completed { bundle, output_path },
                        Ok((bundle, Err(e))) => ExecutionOutcome::WriteFailed {
                            bundle,
                            error: e.to_string(),
                        },
                        Err(e) => ExecutionOutcome::Failed {
                            error: format!("Output writer stopped: {}", e),
                        },
                    }
                }
            };

            if outcome_tx.send(outcome).is_err() {
                debug!("ExecutionController: outcome receiver dropped");
            }
        });

        self.running = Some(Running {
            progress_rx: Some(progress_rx),
            outcome_rx,
        });
        Ok(())
    }

    /// Next progress message, then the outcome once progress is drained
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` arm. Pends forever
    /// while nothing is running.
    pub async fn next_message(&mut self) -> ExecutionMessage {
        loop {
            let Some(running) = self.running.as_mut() else {
                return std::future::pending().await;
            };

            if let Some(rx) = running.progress_rx.as_mut() {
                match rx.recv().await {
                    Some(message) => return ExecutionMessage::Progress(message),
                    None => {
                        debug!("ExecutionController::next_message: progress channel closed");
                        running.progress_rx = None;
                        continue;
                    }
                }
            }

            let outcome = match (&mut running.outcome_rx).await {
                Ok(outcome) => outcome,
                Err(_) => ExecutionOutcome::Failed {
                    error: "Execution task ended without a result".to_string(),
                },
            };
            self.running = None;
            return ExecutionMessage::Finished(outcome);
        }
    }
}
