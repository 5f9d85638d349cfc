//! TUI application - event handling and state management
//!
//! The App struct owns the AppState and applies every transition: key and
//! mouse input, plus the results of background work delivered by the runner.
//! It does not do any rendering or I/O. Side effects are requested through
//! [`PendingAction`] and carried out by the runner.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tracing::{debug, info, trace, warn};

use super::settings_editor::SettingsEditor;
use super::state::{AppState, ExecutionView, LogLine, Pane, PendingAction, Severity, StatusKind, SwitcherFocus};
use crate::config::Settings;
use crate::domain::{ExecutionOutcome, WorkItem};
use crate::providers::ProviderRegistry;
use crate::tasks::{SearchOutcome, SearchVia};

/// Lines scrolled per mouse wheel notch
const WHEEL_LINES: usize = 3;

/// TUI application
#[derive(Debug)]
pub struct App {
    /// Application state
    state: AppState,
}

impl App {
    /// Create a new application instance
    pub fn new(settings: Settings, registry: Arc<ProviderRegistry>) -> Self {
        debug!("App::new: called");
        Self {
            state: AppState::new(settings, registry),
        }
    }

    /// Get reference to state
    pub fn state(&self) -> &AppState {
        trace!("App::state: called");
        &self.state
    }

    /// Get mutable reference to state
    pub fn state_mut(&mut self) -> &mut AppState {
        trace!("App::state_mut: called");
        &mut self.state
    }

    /// Take the side effect requested by the last transition, if any
    pub fn take_pending_action(&mut self) -> Option<PendingAction> {
        self.state.pending_action.take()
    }

    /// Handle a key event
    ///
    /// Returns true if the application should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        debug!(?key, "App::handle_key: called");
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            debug!("App::handle_key: Ctrl+C force quit");
            self.state.should_quit = true;
            return true;
        }

        if self.state.execution_in_flight {
            debug!("App::handle_key: execution in flight");
            self.handle_in_flight_key(key);
        } else if self.state.searching {
            debug!("App::handle_key: search overlay");
            self.handle_search_key(key);
        } else if self.state.pane == Pane::SettingsEditor {
            debug!("App::handle_key: settings editor");
            self.handle_settings_key(key);
        } else {
            self.handle_normal_key(key);
        }
        self.state.should_quit
    }

    /// Handle a mouse event: the wheel scrolls the log or moves the task cursor
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        trace!(?mouse, "App::handle_mouse: called");
        let up = match mouse.kind {
            MouseEventKind::ScrollUp => true,
            MouseEventKind::ScrollDown => false,
            _ => return,
        };
        if self.state.pane == Pane::ExecutionLog || self.state.execution_in_flight {
            self.scroll_log(up, WHEEL_LINES);
        } else if self.state.pane == Pane::TaskBrowser && !self.state.searching {
            self.state.task_list.move_cursor(if up { -1 } else { 1 });
        }
    }

    /// Only log scrolling is accepted while an execution runs
    fn handle_in_flight_key(&mut self, key: KeyEvent) {
        let page = self.state.log_viewport.max(1);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.scroll_log(true, 1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_log(false, 1),
            KeyCode::PageUp => self.scroll_log(true, page),
            KeyCode::PageDown => self.scroll_log(false, page),
            _ => {
                debug!(?key, "App::handle_in_flight_key: ignored");
                self.state
                    .set_status("⏳ Execution in progress, please wait (Ctrl+C quits)", StatusKind::Loading);
            }
        }
    }

    /// Handle key in normal mode
    fn handle_normal_key(&mut self, key: KeyEvent) {
        debug!(?key, pane = ?self.state.pane, "App::handle_normal_key: called");
        match key.code {
            KeyCode::Char('q') => {
                debug!("App::handle_normal_key: quit requested");
                self.state.should_quit = true;
            }
            KeyCode::Esc => {
                if self.state.pane == Pane::TaskBrowser && self.state.task_list.filter().is_some() {
                    debug!("App::handle_normal_key: Esc - clear filter");
                    self.state.task_list.show_all();
                    let count = self.state.task_list.visible().len();
                    self.state.set_status(format!("Showing all {} tasks", count), StatusKind::Ok);
                }
                self.state.pane = Pane::TaskBrowser;
            }
            KeyCode::Tab => self.state.pane = self.state.pane.next(),
            KeyCode::BackTab => self.state.pane = self.state.pane.prev(),
            KeyCode::Up | KeyCode::Char('k') => self.cursor_up(),
            KeyCode::Down | KeyCode::Char('j') => self.cursor_down(),
            KeyCode::PageUp if self.state.pane == Pane::ExecutionLog => {
                let page = self.state.log_viewport;
                self.scroll_log(true, page);
            }
            KeyCode::PageDown if self.state.pane == Pane::ExecutionLog => {
                let page = self.state.log_viewport;
                self.scroll_log(false, page);
            }
            KeyCode::Enter => self.handle_enter(),
            KeyCode::Char('/') if self.state.pane == Pane::TaskBrowser => {
                debug!("App::handle_normal_key: entering search");
                self.state.searching = true;
                self.state.search_input.clear();
            }
            KeyCode::Char('r') => {
                debug!("App::handle_normal_key: refresh");
                self.state.loading = true;
                self.state.set_status("Refreshing…", StatusKind::Loading);
                self.state.pending_action = Some(PendingAction::Refresh);
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                debug!("App::handle_normal_key: open settings editor");
                self.state.settings_editor = Some(SettingsEditor::new(&self.state.settings, self.state.registry.clone()));
                self.state.pane = Pane::SettingsEditor;
            }
            KeyCode::Char('l') | KeyCode::Char('L') => self.state.pane = Pane::ExecutionLog,
            _ => debug!("App::handle_normal_key: unhandled key"),
        }
    }

    fn cursor_up(&mut self) {
        match self.state.pane {
            Pane::TaskBrowser => self.state.task_list.move_cursor(-1),
            Pane::ModelSwitcher(SwitcherFocus::Providers) => {
                if self.state.switcher.provider > 0 {
                    self.state.switcher.provider -= 1;
                    self.state.switcher.model = 0;
                }
            }
            Pane::ModelSwitcher(SwitcherFocus::Models) => {
                self.state.switcher.model = self.state.switcher.model.saturating_sub(1);
            }
            Pane::ExecutionLog => self.scroll_log(true, 1),
            Pane::SettingsEditor => {}
        }
    }

    fn cursor_down(&mut self) {
        match self.state.pane {
            Pane::TaskBrowser => self.state.task_list.move_cursor(1),
            Pane::ModelSwitcher(SwitcherFocus::Providers) => {
                if self.state.switcher.provider + 1 < self.state.registry.len() {
                    self.state.switcher.provider += 1;
                    self.state.switcher.model = 0;
                }
            }
            Pane::ModelSwitcher(SwitcherFocus::Models) => {
                let models = self.state.switcher_provider().map(|p| p.models.len()).unwrap_or(0);
                if self.state.switcher.model + 1 < models {
                    self.state.switcher.model += 1;
                }
            }
            Pane::ExecutionLog => self.scroll_log(false, 1),
            Pane::SettingsEditor => {}
        }
    }

    fn scroll_log(&mut self, up: bool, lines: usize) {
        let max = self.state.log_max_scroll(self.state.log_viewport);
        if up {
            self.state.log_scroll_up(lines, max);
        } else {
            self.state.log_scroll_down(lines, max);
        }
    }

    fn handle_enter(&mut self) {
        debug!(pane = ?self.state.pane, "App::handle_enter: called");
        match self.state.pane {
            Pane::TaskBrowser => {
                if let Some(item) = self.state.task_list.selected() {
                    info!(id = %item.id, "Execution requested");
                    self.state.pending_action = Some(PendingAction::Execute(item.clone()));
                }
            }
            Pane::ModelSwitcher(SwitcherFocus::Providers) => {
                self.state.switcher.model = 0;
                self.state.pane = Pane::ModelSwitcher(SwitcherFocus::Models);
            }
            Pane::ModelSwitcher(SwitcherFocus::Models) => {
                let Some(provider) = self.state.switcher_provider() else {
                    return;
                };
                let Some(model) = provider.models.get(self.state.switcher.model) else {
                    return;
                };
                let (id, name, model) = (provider.id.clone(), provider.name.clone(), model.clone());
                info!(provider = %id, %model, "Switched model");
                self.state.settings.provider = id;
                self.state.settings.model = model.clone();
                self.state
                    .set_status(format!("✅ Switched to {} / {}", name, model), StatusKind::Ok);
                self.state.pane = Pane::ModelSwitcher(SwitcherFocus::Providers);
            }
            Pane::ExecutionLog | Pane::SettingsEditor => {}
        }
    }

    /// Handle key while the search overlay is open
    fn handle_search_key(&mut self, key: KeyEvent) {
        debug!(?key, "App::handle_search_key: called");
        match key.code {
            KeyCode::Esc => {
                debug!("App::handle_search_key: Esc - cancel search");
                self.state.searching = false;
                self.state.pane = Pane::TaskBrowser;
            }
            KeyCode::Enter => {
                let query = self.state.search_input.trim().to_string();
                self.state.searching = false;
                self.state.pane = Pane::TaskBrowser;
                if query.is_empty() {
                    debug!("App::handle_search_key: empty query, showing all");
                    self.state.task_list.show_all();
                    let count = self.state.task_list.visible().len();
                    self.state.set_status(format!("Showing all {} tasks", count), StatusKind::Ok);
                } else {
                    debug!(%query, "App::handle_search_key: searching");
                    self.state.loading = true;
                    self.state.set_status(format!("Searching for \"{}\"…", query), StatusKind::Loading);
                    self.state.pending_action = Some(PendingAction::Search(query));
                }
            }
            KeyCode::Backspace => {
                self.state.search_input.pop();
            }
            KeyCode::Char(c) => self.state.search_input.push(c),
            _ => debug!("App::handle_search_key: unhandled key"),
        }
    }

    /// Handle key while the settings editor is open
    fn handle_settings_key(&mut self, key: KeyEvent) {
        debug!(?key, "App::handle_settings_key: called");
        if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.save_settings();
            return;
        }
        if key.code == KeyCode::Esc {
            debug!("App::handle_settings_key: Esc - discard draft");
            self.close_settings_editor();
            self.state.set_status("Settings unchanged", StatusKind::Neutral);
            return;
        }

        let Some(editor) = self.state.settings_editor.as_mut() else {
            warn!("Settings pane active without an editor");
            self.state.pane = Pane::TaskBrowser;
            return;
        };
        match key.code {
            KeyCode::Tab | KeyCode::Down => editor.focus_next(),
            KeyCode::BackTab | KeyCode::Up => editor.focus_prev(),
            KeyCode::Enter => editor.confirm(),
            KeyCode::Left => editor.cycle(-1),
            KeyCode::Right => editor.cycle(1),
            KeyCode::Backspace => editor.backspace(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => editor.input_char(c),
            _ => debug!("App::handle_settings_key: unhandled key"),
        }
    }

    /// Commit every field into the real settings and request persistence
    fn save_settings(&mut self) {
        debug!("App::save_settings: called");
        let Some(editor) = self.state.settings_editor.as_ref() else {
            self.state.pane = Pane::TaskBrowser;
            return;
        };
        let settings = editor.save_all();
        info!(provider = %settings.provider, model = %settings.model, "Settings committed");
        self.state.settings = settings.clone();
        self.state.sync_switcher();
        self.state.pending_action = Some(PendingAction::PersistSettings(settings));
        self.state.set_status("Saving settings…", StatusKind::Loading);
        self.close_settings_editor();
    }

    fn close_settings_editor(&mut self) {
        self.state.settings_editor = None;
        self.state.pane = Pane::TaskBrowser;
    }

    // === Background results ===

    /// Items arrived from the task source (or it was unavailable)
    pub fn on_items_loaded(&mut self, result: Result<Vec<WorkItem>, String>) {
        debug!(ok = result.is_ok(), "App::on_items_loaded: called");
        self.state.loading = false;
        let (text, kind) = match result {
            Ok(items) => {
                let count = items.len();
                self.state.task_list.load(items);
                (format!("Loaded {} tasks", count), StatusKind::Ok)
            }
            Err(e) => {
                warn!(error = %e, "Could not load tasks");
                self.state.task_list.load(Vec::new());
                (format!("Could not load tasks: {}", e), StatusKind::Error)
            }
        };
        // The execution owns the status line until it finishes
        if !self.state.execution_in_flight {
            self.state.set_status(text, kind);
        }
    }

    /// A search finished; remote or local, it always carries a result set
    ///
    /// Only the task list changes. The pane, the overlay and the editor stay
    /// wherever the user has moved them since the search was submitted.
    pub fn on_search_finished(&mut self, outcome: SearchOutcome) {
        debug!(query = %outcome.query, count = outcome.items.len(), "App::on_search_finished: called");
        self.state.loading = false;
        if self.state.searching && self.state.search_input.trim() != outcome.query.trim() {
            debug!(query = %outcome.query, "App::on_search_finished: overlay reopened, dropping stale result");
            return;
        }
        let count = outcome.items.len();
        self.state.task_list.apply_filter(&outcome.query, outcome.items);
        if self.state.execution_in_flight {
            debug!("App::on_search_finished: execution in flight, keeping status");
            return;
        }
        let text = match outcome.via {
            SearchVia::Unfiltered => format!("Showing all {} tasks", count),
            SearchVia::Remote => format!("Found {} tasks", count),
            SearchVia::LocalFallback { reason } => {
                format!("Found {} tasks (local filter — remote search unavailable: {})", count, reason)
            }
        };
        self.state.set_status(text, StatusKind::Ok);
    }

    /// The runner accepted an execution request and started the engine
    pub fn begin_execution(&mut self, item: &WorkItem, provider: &str, model: &str) {
        info!(id = %item.id, %provider, %model, "Execution started");
        self.state.progress_log.clear();
        self.state.last_outcome = None;
        self.state.log_scroll = None;
        self.state.execution = Some(ExecutionView {
            item_name: item.name.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
        });
        self.state.execution_in_flight = true;
        self.state.pane = Pane::ExecutionLog;
        self.state.set_status(format!("⚡ Executing {}…", item.name), StatusKind::Loading);
    }

    /// The execution request failed its up-front checks
    pub fn on_execution_rejected(&mut self, reason: &str) {
        warn!(%reason, "Execution rejected");
        self.state.set_status(format!("❌ {}", reason), StatusKind::Error);
    }

    /// One progress message from the engine, appended verbatim
    pub fn on_progress(&mut self, message: String) {
        debug!(%message, "App::on_progress: called");
        self.state.progress_log.push(LogLine::new(message, Severity::Dim));
    }

    /// The terminal event of an execution
    pub fn on_execution_finished(&mut self, outcome: ExecutionOutcome) {
        debug!(success = outcome.is_success(), "App::on_execution_finished: called");
        self.state.execution_in_flight = false;
        match &outcome {
            ExecutionOutcome::Completed { output_path, .. } => {
                info!(path = %output_path.display(), "Execution complete");
                self.state.set_status(
                    format!("✅ Task complete, output saved to {}", output_path.display()),
                    StatusKind::Ok,
                );
            }
            ExecutionOutcome::WriteFailed { error, .. } => {
                warn!(%error, "Execution output not saved");
                self.state
                    .set_status(format!("❌ Could not save output: {}", error), StatusKind::Error);
            }
            ExecutionOutcome::Failed { error } => {
                warn!(%error, "Execution failed");
                self.state.set_status(format!("❌ Execution failed: {}", error), StatusKind::Error);
            }
        }
        self.state.last_outcome = Some(outcome);
    }

    /// The settings store finished writing
    pub fn on_settings_saved(&mut self, result: Result<(), String>, location: &str) {
        debug!(ok = result.is_ok(), "App::on_settings_saved: called");
        match result {
            Ok(()) => self
                .state
                .set_status(format!("✅ Settings saved to {}", location), StatusKind::Ok),
            Err(e) => self.state.set_status(format!("❌ Save failed: {}", e), StatusKind::Error),
        }
    }

    /// Advance the spinner
    pub fn tick(&mut self) {
        self.state.tick();
    }
}
