//! task-agent - Asana task console with LLM execution
//!
//! CLI entry point: the interactive console plus non-interactive commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info, warn};

use taskagent::cli::{Cli, Command, generate_after_help, get_log_path};
use taskagent::config::{FileSettingsStore, Settings, SettingsStore};
use taskagent::domain::{ExecutionOutcome, WorkItem};
use taskagent::engine::LlmEngine;
use taskagent::output::{DirectoryOutput, preview};
use taskagent::providers::ProviderRegistry;
use taskagent::tasks::{AsanaCli, TaskSource};
use taskagent::tui::{self, Collaborators, ExecutionController, ExecutionMessage, ExecutionRequest};
use taskagent::tui::views::truncate_display;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > settings file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows tool and key checks
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let registry = ProviderRegistry::shared();
    let store = Arc::new(FileSettingsStore::from_option(cli.config.as_ref()));
    let mut settings = store.load();

    setup_logging(cli.log_level.as_deref(), settings.log_level.as_deref()).context("Failed to setup logging")?;
    settings.normalize(&registry);
    info!(provider = %settings.provider, model = %settings.model, "task-agent loaded settings");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Tui) => cmd_tui(settings, registry, store).await,
        Some(Command::Run {
            id,
            provider,
            model,
            output,
        }) => cmd_run(settings, registry, &id, provider, model, output).await,
        Some(Command::List { project, json }) => cmd_list(&settings, project, json).await,
        Some(Command::Search { query, workspace, json }) => cmd_search(&settings, &query, workspace, json).await,
        Some(Command::Complete { id }) => cmd_complete(&settings, &id).await,
        Some(Command::Providers) => cmd_providers(&settings, &registry),
    }
}

/// Locate asana-cli, or explain how to get it
fn task_source(settings: &Settings) -> Result<AsanaCli> {
    AsanaCli::locate(settings.asana_cli_path.as_deref())
        .context("asana-cli is required (install it or set asana-cli-path in settings)")
}

async fn cmd_tui(settings: Settings, registry: Arc<ProviderRegistry>, store: Arc<FileSettingsStore>) -> Result<()> {
    debug!("cmd_tui: called");
    let source: Option<Arc<dyn TaskSource>> = match AsanaCli::locate(settings.asana_cli_path.as_deref()) {
        Ok(cli) => Some(Arc::new(cli)),
        Err(e) => {
            warn!("Task source unavailable: {}", e);
            None
        }
    };
    let engine = LlmEngine::new().context("Failed to create HTTP client")?;

    let collaborators = Collaborators {
        source,
        engine: Arc::new(engine),
        output: Arc::new(DirectoryOutput::new()),
        store,
    };
    tui::run(settings, registry, collaborators).await
}

async fn cmd_run(
    mut settings: Settings,
    registry: Arc<ProviderRegistry>,
    id: &str,
    provider: Option<String>,
    model: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    debug!(%id, ?provider, ?model, ?output, "cmd_run: called");
    if let Some(provider) = provider {
        settings.provider = provider;
    }
    if let Some(model) = model {
        settings.model = model;
    }
    if let Some(output) = output {
        settings.output_dir = output;
    }

    let source = task_source(&settings)?;
    println!("🔍 Fetching task {}...", id);
    let item = source.get_item(id).await.context(format!("Failed to fetch task {}", id))?;

    let request = ExecutionRequest::from_settings(item, &settings, &registry)?;
    println!(
        "🤖 Provider : {} / {}",
        request.target.provider.name.cyan(),
        request.target.model.cyan()
    );
    println!("📋 Task     : {}", request.item.name.bold());
    println!();

    let engine = LlmEngine::new().context("Failed to create HTTP client")?;
    let mut controller = ExecutionController::new(Arc::new(engine), Arc::new(DirectoryOutput::new()));
    controller.start(request)?;

    loop {
        match controller.next_message().await {
            ExecutionMessage::Progress(message) => println!(" → {}", message.dimmed()),
            ExecutionMessage::Finished(outcome) => return report_outcome(outcome),
        }
    }
}

fn report_outcome(outcome: ExecutionOutcome) -> Result<()> {
    match outcome {
        ExecutionOutcome::Completed { bundle, output_path } => {
            println!("\n{} Saved to: {}\n", "✅".green(), output_path.display());
            println!("{}", preview(&bundle));
            Ok(())
        }
        ExecutionOutcome::WriteFailed { bundle, error } => {
            println!("{}", preview(&bundle));
            Err(eyre!("Could not save output: {}", error))
        }
        ExecutionOutcome::Failed { error } => Err(eyre!("Execution failed: {}", error)),
    }
}

async fn cmd_list(settings: &Settings, project: Option<String>, json: bool) -> Result<()> {
    debug!(?project, json, "cmd_list: called");
    let source = task_source(settings)?;
    let project = project.unwrap_or_else(|| settings.project_gid.clone());
    let project = Some(project.as_str()).filter(|p| !p.is_empty());
    let items = source.list_items(project).await.context("Failed to list tasks")?;
    print_items(&items, json)
}

async fn cmd_search(settings: &Settings, query: &str, workspace: Option<String>, json: bool) -> Result<()> {
    debug!(%query, ?workspace, json, "cmd_search: called");
    let workspace = workspace.unwrap_or_else(|| settings.workspace_gid.clone());
    if workspace.trim().is_empty() {
        return Err(eyre!("Workspace gid required: pass --workspace or set workspace-gid in settings"));
    }
    let source = task_source(settings)?;
    let items = source.search_items(&workspace, query).await.context("Search failed")?;
    print_items(&items, json)
}

async fn cmd_complete(settings: &Settings, id: &str) -> Result<()> {
    debug!(%id, "cmd_complete: called");
    let source = task_source(settings)?;
    source.complete_item(id).await.context(format!("Failed to complete task {}", id))?;
    println!("{} Task {} marked complete", "✅".green(), id);
    Ok(())
}

fn print_items(items: &[WorkItem], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items).context("Failed to encode tasks")?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!();
    println!("{:<20} {:<6} {:<8} {}", "ID".bold(), "DONE".bold(), "PRIORITY".bold(), "NAME".bold());
    println!("{}", "─".repeat(70));
    for item in items {
        let done = if item.completed { "✅" } else { "⏳" };
        println!(
            "{:<20} {:<5} {:<8} {}",
            truncate_display(&item.id, 18),
            done,
            item.priority.to_string(),
            truncate_display(&item.name, 38)
        );
    }
    println!();
    Ok(())
}

fn cmd_providers(settings: &Settings, registry: &ProviderRegistry) -> Result<()> {
    debug!("cmd_providers: called");
    for provider in registry.all() {
        let status = if !provider.requires_key() {
            "🔧 local (no key needed)".cyan()
        } else if settings.api_key(provider).is_some() {
            "✅ key found".green()
        } else {
            "❌ no key".red()
        };

        println!("\n{}", "─".repeat(42));
        println!("📦 {} ({})  {}", provider.name.bold(), provider.id, status);
        if let Some(env_key) = &provider.env_key {
            println!("   Env: {}", env_key);
        }
        for model in &provider.models {
            if provider.id == settings.provider && *model == settings.model {
                println!("     {} {}", "▶".green(), model.green());
            } else {
                println!("       {}", model);
            }
        }
    }
    println!();
    Ok(())
}
