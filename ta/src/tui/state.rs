//! TUI application state
//!
//! Pure data structures for the console. No rendering or I/O here; the
//! runner owns an [`AppState`] and the render composer only reads it.

use std::sync::Arc;

use tracing::debug;

use super::settings_editor::SettingsEditor;
use super::task_list::TaskList;
use crate::config::Settings;
use crate::domain::{ExecutionOutcome, WorkItem};
use crate::output::preview;
use crate::providers::{Provider, ProviderRegistry};

/// Spinner frames advanced on every tick while something is loading
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Which column of the model switcher has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherFocus {
    Providers,
    Models,
}

/// Interaction surface receiving input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    TaskBrowser,
    ModelSwitcher(SwitcherFocus),
    ExecutionLog,
    /// Full-screen settings editor; reachable only by shortcut
    SettingsEditor,
}

impl Pane {
    /// Next pane in the Tab cycle
    pub fn next(self) -> Self {
        debug!(?self, "Pane::next: called");
        match self {
            Self::TaskBrowser => Self::ModelSwitcher(SwitcherFocus::Providers),
            Self::ModelSwitcher(SwitcherFocus::Providers) => Self::ModelSwitcher(SwitcherFocus::Models),
            Self::ModelSwitcher(SwitcherFocus::Models) => Self::ExecutionLog,
            Self::ExecutionLog => Self::TaskBrowser,
            Self::SettingsEditor => Self::SettingsEditor,
        }
    }

    /// Previous pane in the Tab cycle
    pub fn prev(self) -> Self {
        debug!(?self, "Pane::prev: called");
        match self {
            Self::TaskBrowser => Self::ExecutionLog,
            Self::ModelSwitcher(SwitcherFocus::Providers) => Self::TaskBrowser,
            Self::ModelSwitcher(SwitcherFocus::Models) => Self::ModelSwitcher(SwitcherFocus::Providers),
            Self::ExecutionLog => Self::ModelSwitcher(SwitcherFocus::Models),
            Self::SettingsEditor => Self::SettingsEditor,
        }
    }

    /// Short name for the header
    pub fn display_name(self) -> &'static str {
        match self {
            Self::TaskBrowser => "Tasks",
            Self::ModelSwitcher(SwitcherFocus::Providers) => "Providers",
            Self::ModelSwitcher(SwitcherFocus::Models) => "Models",
            Self::ExecutionLog => "Log",
            Self::SettingsEditor => "Settings",
        }
    }
}

/// Colour class of the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    Ok,
    Error,
    Loading,
    #[default]
    Neutral,
}

/// Status line content
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    pub text: String,
    pub kind: StatusKind,
}

impl Status {
    pub fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Dim,
    Ok,
    Error,
}

/// One line of the execution log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub severity: Severity,
}

impl LogLine {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Info)
    }
}

/// What the log header shows about the current execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionView {
    pub item_name: String,
    pub provider: String,
    pub model: String,
}

/// Cursor positions in the model switcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitcherCursor {
    pub provider: usize,
    pub model: usize,
}

/// Side effect requested by a key handler, consumed by the runner
#[derive(Debug, Clone)]
pub enum PendingAction {
    /// Dispatch this item to the execution engine
    Execute(WorkItem),
    /// Run a search for this (non-empty) query
    Search(String),
    /// Reload items from the task source
    Refresh,
    /// Write these settings through the settings store
    PersistSettings(Settings),
}

/// Main TUI application state
#[derive(Debug)]
pub struct AppState {
    pub pane: Pane,
    /// Search overlay active (orthogonal to `pane`)
    pub searching: bool,
    pub search_input: String,
    pub task_list: TaskList,

    // === Execution ===
    /// Engine progress messages for the current execution, in arrival order
    pub progress_log: Vec<LogLine>,
    pub execution: Option<ExecutionView>,
    pub last_outcome: Option<ExecutionOutcome>,
    pub execution_in_flight: bool,
    /// None = follow the newest line
    pub log_scroll: Option<usize>,
    /// Rows available to the log panel at the current terminal size
    pub log_viewport: usize,

    // === Configuration ===
    pub settings: Settings,
    pub registry: Arc<ProviderRegistry>,
    pub switcher: SwitcherCursor,
    /// Present only while the settings editor is open
    pub settings_editor: Option<SettingsEditor>,

    // === Status ===
    pub status: Status,
    pub loading: bool,
    pub spinner_frame: usize,

    pub pending_action: Option<PendingAction>,
    pub should_quit: bool,
}

impl AppState {
    /// Create the initial state: empty item set, loading
    pub fn new(settings: Settings, registry: Arc<ProviderRegistry>) -> Self {
        debug!(provider = %settings.provider, model = %settings.model, "AppState::new: called");
        let mut state = Self {
            pane: Pane::default(),
            searching: false,
            search_input: String::new(),
            task_list: TaskList::new(),
            progress_log: Vec::new(),
            execution: None,
            last_outcome: None,
            execution_in_flight: false,
            log_scroll: None,
            log_viewport: 1,
            settings,
            registry,
            switcher: SwitcherCursor::default(),
            settings_editor: None,
            status: Status::new("Loading tasks…", StatusKind::Loading),
            loading: true,
            spinner_frame: 0,
            pending_action: None,
            should_quit: false,
        };
        state.sync_switcher();
        state
    }

    pub fn set_status(&mut self, text: impl Into<String>, kind: StatusKind) {
        let text = text.into();
        debug!(%text, ?kind, "AppState::set_status: called");
        self.status = Status::new(text, kind);
    }

    /// Point the model switcher cursors at the selected provider and model
    pub fn sync_switcher(&mut self) {
        debug!("AppState::sync_switcher: called");
        let provider = self.registry.index_of(&self.settings.provider).unwrap_or(0);
        let model = self
            .registry
            .at(provider)
            .map(|p| p.model_index(&self.settings.model))
            .unwrap_or(0);
        self.switcher = SwitcherCursor { provider, model };
    }

    /// Provider under the switcher's provider cursor
    pub fn switcher_provider(&self) -> Option<&Provider> {
        self.registry.at(self.switcher.provider)
    }

    /// Provider currently selected in settings
    pub fn active_provider(&self) -> Option<&Provider> {
        self.registry.get(&self.settings.provider)
    }

    /// Tick: advance the spinner while something is in progress
    pub fn tick(&mut self) {
        if self.loading || self.execution_in_flight {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    /// Size the list and log panels after a terminal resize
    pub fn set_viewports(&mut self, list_rows: usize, log_rows: usize) {
        debug!(list_rows, log_rows, "AppState::set_viewports: called");
        self.task_list.set_viewport(list_rows);
        self.log_viewport = log_rows.max(1);
    }

    /// Every line the execution log shows: header, progress, outcome
    pub fn log_lines(&self) -> Vec<LogLine> {
        let mut lines = Vec::new();
        let Some(execution) = &self.execution else {
            return lines;
        };
        lines.push(LogLine::info(format!("⚡  Executing: {}", execution.item_name)));
        lines.push(LogLine::new(
            format!("🤖  Provider : {} / {}", execution.provider, execution.model),
            Severity::Dim,
        ));
        lines.push(LogLine::info(""));
        for line in &self.progress_log {
            lines.push(LogLine::new(format!("  {}", line.text), line.severity));
        }

        match &self.last_outcome {
            None => {}
            Some(ExecutionOutcome::Failed { error }) => {
                lines.push(LogLine::new(format!("❌  {}", error), Severity::Error));
            }
            Some(ExecutionOutcome::WriteFailed { bundle, error }) => {
                lines.push(LogLine::new(format!("❌  Could not save output: {}", error), Severity::Error));
                lines.push(LogLine::info(""));
                lines.extend(preview(bundle).lines().map(LogLine::info));
            }
            Some(ExecutionOutcome::Completed { bundle, output_path }) => {
                lines.push(LogLine::new("✅  Done!", Severity::Ok));
                lines.push(LogLine::new(format!("📁  {}", output_path.display()), Severity::Ok));
                lines.push(LogLine::info(""));
                lines.extend(preview(bundle).lines().map(LogLine::info));
            }
        }
        lines
    }

    /// Largest scroll offset of the execution log in a panel of `rows` rows
    pub fn log_max_scroll(&self, rows: usize) -> usize {
        self.log_lines().len().saturating_sub(rows.max(1))
    }

    /// First log line shown in a panel of `rows` rows, honoring follow mode
    pub fn log_offset(&self, rows: usize) -> usize {
        let max = self.log_max_scroll(rows);
        self.log_scroll.unwrap_or(max).min(max)
    }

    /// Scroll the execution log up by `lines`
    ///
    /// `max_scroll` is the largest valid offset (content height minus viewport).
    pub fn log_scroll_up(&mut self, lines: usize, max_scroll: usize) {
        debug!(lines, max_scroll, "AppState::log_scroll_up: called");
        let current = self.log_scroll.unwrap_or(max_scroll).min(max_scroll);
        self.log_scroll = Some(current.saturating_sub(lines));
    }

    /// Scroll the execution log down, resuming follow mode at the bottom
    pub fn log_scroll_down(&mut self, lines: usize, max_scroll: usize) {
        debug!(lines, max_scroll, "AppState::log_scroll_down: called");
        let current = self.log_scroll.unwrap_or(max_scroll).min(max_scroll);
        let next = current.saturating_add(lines).min(max_scroll);
        if next >= max_scroll {
            self.log_scroll = None;
        } else {
            self.log_scroll = Some(next);
        }
    }
}
