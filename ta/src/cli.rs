//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::providers::ProviderRegistry;

/// task-agent - browse Asana tasks and hand them to an LLM
#[derive(Parser)]
#[command(
    name = "ta",
    about = "Terminal console for browsing Asana tasks and executing them with an LLM",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to settings file
    #[arg(short, long, global = true, help = "Path to settings file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (defaults to the console)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the interactive console (default)
    Tui,

    /// Execute one task by id without the console
    Run {
        /// Task id (Asana gid)
        id: String,

        /// Provider id (defaults to the configured provider)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Output directory (defaults to the configured directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List tasks in a project
    List {
        /// Project gid (defaults to the configured project)
        #[arg(short = 'P', long)]
        project: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Search tasks in a workspace
    Search {
        /// Search text
        query: String,

        /// Workspace gid (defaults to the configured workspace)
        #[arg(short, long)]
        workspace: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Mark a task complete
    Complete {
        /// Task id (Asana gid)
        id: String,
    },

    /// List providers, their models and credential status
    Providers,
}

/// Result of checking a required tool
pub struct ToolCheck {
    pub name: &'static str,
    pub available: bool,
    pub version: Option<String>,
}

impl ToolCheck {
    /// Check if a tool is available and get its version
    pub fn check(name: &'static str, version_args: &[&str]) -> Self {
        debug!(name, ?version_args, "ToolCheck::check: called");
        let result = std::process::Command::new(name).args(version_args).output();

        match result {
            Ok(output) if output.status.success() => {
                debug!(name, "ToolCheck::check: tool available");
                let version_str = String::from_utf8_lossy(&output.stdout);
                Self {
                    name,
                    available: true,
                    version: Some(parse_version(&version_str)),
                }
            }
            _ => {
                debug!(name, "ToolCheck::check: tool not available");
                Self {
                    name,
                    available: false,
                    version: None,
                }
            }
        }
    }
}

/// Extract the first version-like word from command output
fn parse_version(output: &str) -> String {
    for word in output.split_whitespace() {
        let word = word.trim_start_matches('v');
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let version: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !version.is_empty() {
                return version;
            }
        }
    }
    "unknown".to_string()
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("task-agent")
        .join("logs")
        .join("task-agent.log")
}

/// Generate the after_help text with tool checks and credential status
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let tool = ToolCheck::check("asana-cli", &["--version"]);

    let mut help = String::new();
    help.push_str("Required Tools:\n");
    let icon = if tool.available { "\u{2705}" } else { "\u{274C}" };
    let version = tool.version.as_deref().unwrap_or("not found");
    help.push_str(&format!("  {} {:<10} {}\n", icon, tool.name, version));

    help.push('\n');
    help.push_str("Provider keys (environment):\n");
    for provider in ProviderRegistry::builtin().all() {
        let Some(env_key) = &provider.env_key else {
            continue;
        };
        let set = std::env::var(env_key).is_ok_and(|v| !v.trim().is_empty());
        let icon = if set { "\u{2705}" } else { "\u{274C}" };
        help.push_str(&format!("  {} {:<18} {}\n", icon, env_key, provider.name));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}
