//! TUI Runner - the single-threaded event loop
//!
//! The [`Console`] owns the App and every collaborator, turns the App's
//! pending actions into background work and feeds the results back in as
//! [`ConsoleEvent`]s. The [`TuiRunner`] adds the terminal: it draws after
//! every transition and waits on terminal input and background events with
//! one `tokio::select!`.

use std::sync::Arc;

use crossterm::event::{KeyEvent, MouseEvent};
use eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Tui;
use super::app::App;
use super::events::{Event, EventHandler};
use super::execution::{ExecutionController, ExecutionMessage, ExecutionRequest};
use super::state::PendingAction;
use super::theme::Theme;
use super::views;
use crate::config::{Settings, SettingsStore};
use crate::domain::WorkItem;
use crate::engine::ExecutionEngine;
use crate::output::OutputSink;
use crate::providers::ProviderRegistry;
use crate::tasks::{SearchOutcome, TaskSource, search_with_fallback};

/// Result of background work, delivered to the event loop
#[derive(Debug)]
pub enum ConsoleEvent {
    ItemsLoaded(Result<Vec<WorkItem>, String>),
    SearchFinished(SearchOutcome),
    SettingsSaved(Result<(), String>),
    Execution(ExecutionMessage),
}

/// Collaborators the console talks to
pub struct Collaborators {
    pub source: Option<Arc<dyn TaskSource>>,
    pub engine: Arc<dyn ExecutionEngine>,
    pub output: Arc<dyn OutputSink>,
    pub store: Arc<dyn SettingsStore>,
}

/// App plus the machinery that performs its side effects
pub struct Console {
    app: App,
    source: Option<Arc<dyn TaskSource>>,
    store: Arc<dyn SettingsStore>,
    controller: ExecutionController,
    jobs_tx: mpsc::UnboundedSender<ConsoleEvent>,
    jobs_rx: mpsc::UnboundedReceiver<ConsoleEvent>,
}

impl Console {
    pub fn new(settings: Settings, registry: Arc<ProviderRegistry>, collaborators: Collaborators) -> Self {
        debug!(has_source = collaborators.source.is_some(), "Console::new: called");
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        Self {
            app: App::new(settings, registry),
            source: collaborators.source,
            store: collaborators.store,
            controller: ExecutionController::new(collaborators.engine, collaborators.output),
            jobs_tx,
            jobs_rx,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// Key input; returns true when the console should exit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let quit = self.app.handle_key(key);
        self.process_pending_action();
        quit
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        self.app.handle_mouse(mouse);
    }

    /// Resize the list and log viewports for a terminal of `height` rows
    pub fn handle_resize(&mut self, width: u16, height: u16) {
        debug!(width, height, "Console::handle_resize: called");
        self.app
            .state_mut()
            .set_viewports(views::list_rows(height), views::log_rows(height));
    }

    /// Wait for the next background result
    ///
    /// Cancel safe; pends while nothing is outstanding.
    pub async fn next_background_event(&mut self) -> ConsoleEvent {
        tokio::select! {
            Some(event) = self.jobs_rx.recv() => event,
            message = self.controller.next_message() => ConsoleEvent::Execution(message),
        }
    }

    /// Apply a background result to the App
    pub fn apply(&mut self, event: ConsoleEvent) {
        debug!("Console::apply: called");
        match event {
            ConsoleEvent::ItemsLoaded(result) => self.app.on_items_loaded(result),
            ConsoleEvent::SearchFinished(outcome) => self.app.on_search_finished(outcome),
            ConsoleEvent::SettingsSaved(result) => {
                let location = self.store.location();
                self.app.on_settings_saved(result, &location);
            }
            ConsoleEvent::Execution(ExecutionMessage::Progress(message)) => self.app.on_progress(message),
            ConsoleEvent::Execution(ExecutionMessage::Finished(outcome)) => self.app.on_execution_finished(outcome),
        }
        self.process_pending_action();
    }

    /// Carry out whatever the last transition asked for
    pub fn process_pending_action(&mut self) {
        let Some(action) = self.app.take_pending_action() else {
            return;
        };
        debug!(?action, "Console::process_pending_action: called");
        match action {
            PendingAction::Execute(item) => self.start_execution(item),
            PendingAction::Search(query) => self.start_search(query),
            PendingAction::Refresh => self.refresh(),
            PendingAction::PersistSettings(settings) => self.persist(settings),
        }
    }

    fn start_execution(&mut self, item: WorkItem) {
        debug!(id = %item.id, "Console::start_execution: called");
        let state = self.app.state();
        let request = match ExecutionRequest::from_settings(item.clone(), &state.settings, &state.registry) {
            Ok(request) => request,
            Err(e) => {
                self.app.on_execution_rejected(&e.to_string());
                return;
            }
        };
        let provider = request.target.provider.id.clone();
        let model = request.target.model.clone();
        match self.controller.start(request) {
            Ok(()) => self.app.begin_execution(&item, &provider, &model),
            Err(e) => self.app.on_execution_rejected(&e.to_string()),
        }
    }

    fn start_search(&mut self, query: String) {
        let state = self.app.state();
        let workspace = state.settings.workspace_gid.clone();
        let items = state.task_list.items().to_vec();
        let source = self.source.clone();
        let tx = self.jobs_tx.clone();
        debug!(%query, %workspace, "Console::start_search: spawning");
        tokio::spawn(async move {
            let outcome = search_with_fallback(source, &workspace, &query, &items).await;
            if tx.send(ConsoleEvent::SearchFinished(outcome)).is_err() {
                debug!("Console: search result dropped, console gone");
            }
        });
    }

    /// Reload the item set from the task source
    pub fn refresh(&mut self) {
        let project = self.app.state().settings.project_gid.clone();
        let tx = self.jobs_tx.clone();
        let Some(source) = self.source.clone() else {
            debug!("Console::refresh: no task source");
            let _ = tx.send(ConsoleEvent::ItemsLoaded(Err("No task source available".to_string())));
            return;
        };
        info!(%project, "Loading tasks");
        tokio::spawn(async move {
            let project = (!project.trim().is_empty()).then_some(project.as_str());
            let result = source.list_items(project).await.map_err(|e| e.to_string());
            if tx.send(ConsoleEvent::ItemsLoaded(result)).is_err() {
                debug!("Console: item list dropped, console gone");
            }
        });
    }

    fn persist(&mut self, settings: Settings) {
        let store = self.store.clone();
        let tx = self.jobs_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = store.save(&settings).map_err(|e| format!("{:#}", e));
            if tx.send(ConsoleEvent::SettingsSaved(result)).is_err() {
                debug!("Console: save result dropped, console gone");
            }
        });
    }

    /// Save the current settings before exiting
    pub async fn persist_on_exit(&self) {
        debug!("Console::persist_on_exit: called");
        let store = self.store.clone();
        let settings = self.app.state().settings.clone();
        match tokio::task::spawn_blocking(move || store.save(&settings)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to save settings on exit: {:#}", e),
            Err(e) => warn!("Settings writer stopped: {}", e),
        }
    }
}

/// TUI Runner that manages the terminal and event loop
pub struct TuiRunner {
    console: Console,
    terminal: Tui,
    event_handler: EventHandler,
}

impl TuiRunner {
    pub fn new(terminal: Tui, console: Console, event_handler: EventHandler) -> Self {
        debug!("TuiRunner::new: called");
        Self {
            console,
            terminal,
            event_handler,
        }
    }

    /// Run the main loop until the user quits
    pub async fn run(&mut self) -> Result<()> {
        debug!("TuiRunner::run: called");
        let size = self.terminal.size()?;
        self.console.handle_resize(size.width, size.height);
        self.console.refresh();

        debug!("TuiRunner::run: entering main loop");
        loop {
            let state = self.console.app().state();
            let theme = Theme::from_name(&state.settings.theme);
            self.terminal.draw(|frame| views::render(state, &theme, frame))?;

            tokio::select! {
                event = self.event_handler.next() => {
                    match event? {
                        Event::Tick => self.console.app_mut().tick(),
                        Event::Key(key) => {
                            if self.console.handle_key(key) {
                                break;
                            }
                        }
                        Event::Mouse(mouse) => self.console.handle_mouse(mouse),
                        Event::Resize(width, height) => self.console.handle_resize(width, height),
                    }
                }
                event = self.console.next_background_event() => {
                    self.console.apply(event);
                }
            }

            if self.console.app().state().should_quit {
                debug!("TuiRunner::run: should_quit is true, breaking");
                break;
            }
        }

        self.console.persist_on_exit().await;
        debug!("TuiRunner::run: exiting");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossterm::event::{KeyCode, KeyModifiers};

    use super::*;
    use crate::config::mock::MemorySettingsStore;
    use crate::domain::{ArtifactBundle, OutputFile};
    use crate::engine::mock::MockEngine;
    use crate::output::mock::RecordingOutput;
    use crate::providers::{ApiFlavor, Provider};
    use crate::tasks::SearchVia;
    use crate::tasks::mock::StaticTaskSource;
    use crate::tui::state::{Pane, StatusKind, SwitcherFocus};
    use crate::tui::views::Screen;

    fn registry(env_key: Option<&str>) -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::new(vec![Provider {
            id: "local".to_string(),
            name: "Local".to_string(),
            models: vec!["tiny".to_string(), "small".to_string()],
            default_model: "tiny".to_string(),
            env_key: env_key.map(str::to_string),
            base_url: "http://localhost:1".to_string(),
            flavor: ApiFlavor::OpenAiCompatible,
        }]))
    }

    fn settings() -> Settings {
        Settings {
            provider: "local".to_string(),
            model: "tiny".to_string(),
            workspace_gid: "ws".to_string(),
            ..Settings::default()
        }
    }

    fn items() -> Vec<WorkItem> {
        vec![
            WorkItem::new("1", "Write docs"),
            WorkItem::new("2", "Fix login").with_notes("needs a refactor of sessions"),
            WorkItem::new("3", "Ship release"),
        ]
    }

    fn bundle() -> ArtifactBundle {
        ArtifactBundle {
            summary: "Docs written".to_string(),
            files: vec![
                OutputFile {
                    path: "README.md".to_string(),
                    content: "# Docs".to_string(),
                    description: "readme".to_string(),
                },
                OutputFile {
                    path: "docs/usage.md".to_string(),
                    content: "usage".to_string(),
                    description: String::new(),
                },
            ],
            ..ArtifactBundle::default()
        }
    }

    struct Harness {
        console: Console,
        engine: Arc<MockEngine>,
        store: Arc<MemorySettingsStore>,
    }

    fn harness(engine: MockEngine, source: Option<StaticTaskSource>, registry: Arc<ProviderRegistry>) -> Harness {
        let engine = Arc::new(engine);
        let store = Arc::new(MemorySettingsStore::default());
        let collaborators = Collaborators {
            source: source.map(|s| Arc::new(s) as Arc<dyn TaskSource>),
            engine: engine.clone(),
            output: Arc::new(RecordingOutput::default()),
            store: store.clone(),
        };
        let mut console = Console::new(settings(), registry, collaborators);
        console.handle_resize(120, 40);
        console.app_mut().on_items_loaded(Ok(items()));
        Harness { console, engine, store }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    async fn next_event(console: &mut Console) -> ConsoleEvent {
        tokio::time::timeout(Duration::from_secs(5), console.next_background_event())
            .await
            .expect("background event")
    }

    /// Apply background events until no execution is in flight
    async fn run_to_completion(console: &mut Console) {
        while console.app().state().execution_in_flight {
            let event = next_event(console).await;
            console.apply(event);
        }
    }

    #[tokio::test]
    async fn test_execution_streams_progress_then_outcome() {
        let engine = MockEngine::new(&["Calling local / tiny…", "Parsing response…", "Got 2 file(s)"], Ok(bundle()));
        let mut h = harness(engine, None, registry(None));

        h.console.handle_key(key(KeyCode::Enter));
        assert!(h.console.app().state().execution_in_flight);
        assert_eq!(h.console.app().state().pane, Pane::ExecutionLog);

        run_to_completion(&mut h.console).await;

        let state = h.console.app().state();
        let log: Vec<&str> = state.progress_log.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(log, vec!["Calling local / tiny…", "Parsing response…", "Got 2 file(s)"]);
        let outcome = state.last_outcome.as_ref().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.bundle().unwrap().file_count(), 2);
        assert!(!state.execution_in_flight);
        assert_eq!(state.pane, Pane::ExecutionLog);
        assert_eq!(state.status.kind, StatusKind::Ok);
    }

    #[tokio::test]
    async fn test_second_execution_rejected_while_in_flight() {
        let engine = MockEngine::new(&["one", "two"], Ok(bundle())).with_delay(Duration::from_millis(20));
        let mut h = harness(engine, None, registry(None));

        h.console.handle_key(key(KeyCode::Enter));
        let first = next_event(&mut h.console).await;
        h.console.apply(first);

        h.console.handle_key(key(KeyCode::Enter));
        assert_eq!(h.console.app().state().progress_log.len(), 1);

        run_to_completion(&mut h.console).await;
        assert_eq!(h.engine.call_count(), 1);
        assert_eq!(h.console.app().state().progress_log.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_without_background_work() {
        let engine = MockEngine::new(&["never"], Ok(bundle()));
        let mut h = harness(engine, None, registry(Some("TASKAGENT_TEST_NEVER_SET_KEY")));

        h.console.handle_key(key(KeyCode::Enter));

        let state = h.console.app().state();
        assert!(!state.execution_in_flight);
        assert_eq!(state.pane, Pane::TaskBrowser);
        assert_eq!(state.status.kind, StatusKind::Error);
        assert!(state.status.text.contains("TASKAGENT_TEST_NEVER_SET_KEY"));
        assert_eq!(h.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_search_results_replace_view() {
        let remote: Vec<WorkItem> = (0..3).map(|i| WorkItem::new(format!("r{}", i), "Refactor")).collect();
        let source = StaticTaskSource {
            search_results: Some(remote.clone()),
            ..StaticTaskSource::default()
        };
        let mut h = harness(MockEngine::new(&[], Ok(bundle())), Some(source), registry(None));
        h.console.handle_key(key(KeyCode::Down));

        h.console.handle_key(key(KeyCode::Char('/')));
        for c in "refactor".chars() {
            h.console.handle_key(key(KeyCode::Char(c)));
        }
        h.console.handle_key(key(KeyCode::Enter));
        let event = next_event(&mut h.console).await;
        h.console.apply(event);

        let list = &h.console.app().state().task_list;
        assert_eq!(list.visible(), remote.as_slice());
        assert_eq!(list.cursor(), 0);
        assert_eq!(h.console.app().state().status.text, "Found 3 tasks");
    }

    #[tokio::test]
    async fn test_failed_remote_search_filters_locally() {
        let mut h = harness(
            MockEngine::new(&[], Ok(bundle())),
            Some(StaticTaskSource::failing()),
            registry(None),
        );
        h.console.handle_key(key(KeyCode::Char('/')));
        for c in "refactor".chars() {
            h.console.handle_key(key(KeyCode::Char(c)));
        }
        h.console.handle_key(key(KeyCode::Enter));
        let event = next_event(&mut h.console).await;
        h.console.apply(event);

        let state = h.console.app().state();
        assert_eq!(state.task_list.visible().len(), 1);
        assert_eq!(state.task_list.visible()[0].id, "2");
        assert!(state.status.text.contains("local filter"), "{}", state.status.text);
    }

    #[tokio::test]
    async fn test_refresh_without_source_shows_empty_list() {
        let mut h = harness(MockEngine::new(&[], Ok(bundle())), None, registry(None));
        h.console.handle_key(key(KeyCode::Char('r')));
        let event = next_event(&mut h.console).await;
        h.console.apply(event);

        let state = h.console.app().state();
        assert!(state.task_list.is_empty());
        assert!(!state.loading);
        assert_eq!(state.status.kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn test_refresh_loads_from_source() {
        let source = StaticTaskSource::with_items(vec![WorkItem::new("9", "New task")]);
        let mut h = harness(MockEngine::new(&[], Ok(bundle())), Some(source), registry(None));
        h.console.refresh();
        let event = next_event(&mut h.console).await;
        h.console.apply(event);
        assert_eq!(h.console.app().state().task_list.items().len(), 1);
        assert_eq!(h.console.app().state().status.text, "Loaded 1 tasks");
    }

    #[tokio::test]
    async fn test_settings_save_goes_through_store() {
        let mut h = harness(MockEngine::new(&[], Ok(bundle())), None, registry(None));
        h.console.handle_key(key(KeyCode::Char('c')));
        // Workspace field starts as "ws"
        h.console.handle_key(key(KeyCode::Backspace));
        h.console.handle_key(key(KeyCode::Backspace));
        for c in "ws-42".chars() {
            h.console.handle_key(key(KeyCode::Char(c)));
        }
        h.console.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        let event = next_event(&mut h.console).await;
        h.console.apply(event);

        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.store.load().workspace_gid, "ws-42");
        assert_eq!(h.console.app().state().status.text, "✅ Settings saved to memory");
    }

    #[tokio::test]
    async fn test_persist_on_exit_saves_switcher_choice() {
        let mut h = harness(MockEngine::new(&[], Ok(bundle())), None, registry(None));
        h.console.app_mut().state_mut().pane = Pane::ModelSwitcher(SwitcherFocus::Models);
        h.console.handle_key(key(KeyCode::Down));
        h.console.handle_key(key(KeyCode::Enter));
        h.console.persist_on_exit().await;
        assert_eq!(h.store.load().model, "small");
    }

    fn fix_login_result() -> ConsoleEvent {
        ConsoleEvent::SearchFinished(SearchOutcome {
            query: "fix".to_string(),
            items: vec![WorkItem::new("2", "Fix login")],
            via: SearchVia::Remote,
        })
    }

    #[tokio::test]
    async fn test_background_results_during_execution_keep_log_pane() {
        let engine = MockEngine::new(&["Calling local / tiny…", "Parsing response…"], Ok(bundle()));
        let mut h = harness(engine, None, registry(None));
        h.console.handle_key(key(KeyCode::Enter));
        assert!(h.console.app().state().execution_in_flight);

        h.console.apply(fix_login_result());
        h.console.apply(ConsoleEvent::ItemsLoaded(Ok(items())));
        let state = h.console.app().state();
        assert!(state.execution_in_flight);
        assert_eq!(state.pane, Pane::ExecutionLog);
        assert_eq!(state.status.kind, StatusKind::Loading);

        run_to_completion(&mut h.console).await;
        let state = h.console.app().state();
        let log: Vec<&str> = state.progress_log.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(log, vec!["Calling local / tiny…", "Parsing response…"]);
        assert!(state.last_outcome.as_ref().unwrap().is_success());
        assert_eq!(state.pane, Pane::ExecutionLog);
        assert_eq!(h.engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_background_results_while_editing_settings_keep_editor() {
        let mut h = harness(MockEngine::new(&[], Ok(bundle())), None, registry(None));
        h.console.handle_key(key(KeyCode::Char('c')));

        h.console.apply(fix_login_result());
        h.console.apply(ConsoleEvent::ItemsLoaded(Ok(items())));
        let state = h.console.app().state();
        assert_eq!(state.pane, Pane::SettingsEditor);
        assert!(state.settings_editor.is_some());
        assert_eq!(Screen::select(state, ratatui::layout::Rect::new(0, 0, 120, 40)), Screen::Settings);

        // Enter edits the focused field instead of starting an execution
        h.console.handle_key(key(KeyCode::Enter));
        assert!(!h.console.app().state().execution_in_flight);
        assert_eq!(h.engine.call_count(), 0);

        h.console.handle_key(key(KeyCode::Esc));
        assert_eq!(h.console.app().state().pane, Pane::TaskBrowser);
        assert_eq!(h.console.app().state().task_list.visible().len(), 3);
    }
}
