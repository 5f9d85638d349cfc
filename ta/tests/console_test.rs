//! Integration tests for the task console
//!
//! Drive the console the way the event loop does (keys in, background
//! events applied) with in-process collaborators and real file-backed
//! settings and output.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tempfile::TempDir;

use taskagent::config::{FileSettingsStore, Settings, SettingsStore};
use taskagent::domain::{ArtifactBundle, OutputFile, WorkItem};
use taskagent::engine::{EngineError, EngineTarget, ExecutionEngine, ProgressReporter, parse_bundle};
use taskagent::output::DirectoryOutput;
use taskagent::providers::{ApiFlavor, Provider, ProviderRegistry};
use taskagent::tasks::{TaskSource, TaskSourceError};
use taskagent::tui::state::{Pane, StatusKind};
use taskagent::tui::views::compose;
use taskagent::tui::{Collaborators, Console, ConsoleEvent, Theme};

// =============================================================================
// Collaborators
// =============================================================================

/// Engine that reports fixed progress and parses a canned model reply
struct CannedEngine {
    progress: Vec<&'static str>,
    reply: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl ExecutionEngine for CannedEngine {
    async fn execute(
        &self,
        target: &EngineTarget,
        task_description: &str,
        progress: &ProgressReporter,
    ) -> Result<ArtifactBundle, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(task_description.starts_with("# Task: "));
        progress
            .report(format!("Calling {} / {}…", target.provider.name, target.model))
            .await;
        for message in &self.progress {
            progress.report(*message).await;
        }
        Ok(parse_bundle(self.reply))
    }
}

/// Task source with a fixed item set; remote search can be switched off
struct FixedSource {
    items: Vec<WorkItem>,
    search_works: bool,
}

#[async_trait]
impl TaskSource for FixedSource {
    async fn list_items(&self, _project: Option<&str>) -> Result<Vec<WorkItem>, TaskSourceError> {
        Ok(self.items.clone())
    }

    async fn search_items(&self, _workspace: &str, query: &str) -> Result<Vec<WorkItem>, TaskSourceError> {
        if !self.search_works {
            return Err(TaskSourceError::Remote("search is down".to_string()));
        }
        let needle = query.to_lowercase();
        Ok(self
            .items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn get_item(&self, id: &str) -> Result<WorkItem, TaskSourceError> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| TaskSourceError::Remote(format!("no task {}", id)))
    }

    async fn complete_item(&self, _id: &str) -> Result<(), TaskSourceError> {
        Ok(())
    }
}

const REPLY: &str = r##"```json
{
  "summary": "Drafted the release notes",
  "output_type": "markdown",
  "files": [
    {"path": "NOTES.md", "content": "# Release 1.2", "description": "release notes"},
    {"path": "docs/changelog.md", "content": "- fixed login", "description": "changelog"}
  ],
  "notes": "Review before publishing"
}
```"##;

fn registry() -> Arc<ProviderRegistry> {
    Arc::new(ProviderRegistry::new(vec![Provider {
        id: "local".to_string(),
        name: "Local".to_string(),
        models: vec!["tiny".to_string()],
        default_model: "tiny".to_string(),
        env_key: None,
        base_url: "http://localhost:1".to_string(),
        flavor: ApiFlavor::OpenAiCompatible,
    }]))
}

fn items() -> Vec<WorkItem> {
    vec![
        WorkItem::new("100", "Write release notes"),
        WorkItem::new("101", "Fix login").with_notes("session refactor"),
        WorkItem::new("102", "Refactor billing"),
    ]
}

struct Fixture {
    _dir: TempDir,
    console: Console,
    engine: Arc<CannedEngine>,
    store: Arc<FileSettingsStore>,
    output_dir: std::path::PathBuf,
}

fn fixture(search_works: bool) -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let output_dir = dir.path().join("outputs");
    let store = Arc::new(FileSettingsStore::new(dir.path().join("settings.yml")));
    let settings = Settings {
        provider: "local".to_string(),
        model: "tiny".to_string(),
        workspace_gid: "ws".to_string(),
        output_dir: output_dir.clone(),
        ..Settings::default()
    };
    let engine = Arc::new(CannedEngine {
        progress: vec!["Parsing response…", "Got 2 file(s) — output type: markdown"],
        reply: REPLY,
        calls: AtomicUsize::new(0),
    });
    let collaborators = Collaborators {
        source: Some(Arc::new(FixedSource {
            items: items(),
            search_works,
        })),
        engine: engine.clone(),
        output: Arc::new(DirectoryOutput::new()),
        store: store.clone(),
    };
    let mut console = Console::new(settings, registry(), collaborators);
    console.handle_resize(100, 30);
    Fixture {
        _dir: dir,
        console,
        engine,
        store,
        output_dir,
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::from(code)
}

fn type_text(console: &mut Console, text: &str) {
    for c in text.chars() {
        console.handle_key(key(KeyCode::Char(c)));
    }
}

async fn next_event(console: &mut Console) -> ConsoleEvent {
    tokio::time::timeout(Duration::from_secs(5), console.next_background_event())
        .await
        .expect("Timed out waiting for a background event")
}

/// Refresh and apply the resulting item list
async fn load(console: &mut Console) {
    console.refresh();
    let event = next_event(console).await;
    console.apply(event);
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_then_execute_writes_bundle_to_disk() {
    let mut f = fixture(true);
    load(&mut f.console).await;
    assert_eq!(f.console.app().state().task_list.visible().len(), 3);

    f.console.handle_key(key(KeyCode::Enter));
    assert!(f.console.app().state().execution_in_flight);

    while f.console.app().state().execution_in_flight {
        let event = next_event(&mut f.console).await;
        f.console.apply(event);
    }

    let state = f.console.app().state();
    let log: Vec<&str> = state.progress_log.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(
        log,
        vec![
            "Calling Local / tiny…",
            "Parsing response…",
            "Got 2 file(s) — output type: markdown"
        ]
    );
    assert_eq!(state.pane, Pane::ExecutionLog);
    assert_eq!(state.status.kind, StatusKind::Ok);
    assert_eq!(f.engine.calls.load(Ordering::SeqCst), 1);

    let outcome = state.last_outcome.as_ref().expect("outcome");
    let taskagent::domain::ExecutionOutcome::Completed { output_path, bundle } = outcome else {
        panic!("Expected a completed outcome, got {:?}", outcome);
    };
    assert_eq!(bundle.files.len(), 2);
    assert!(output_path.starts_with(&f.output_dir));
    assert_eq!(
        std::fs::read_to_string(output_path.join("NOTES.md")).unwrap(),
        "# Release 1.2"
    );
    assert!(output_path.join("docs/changelog.md").is_file());
    assert!(output_path.join("SUMMARY.md").is_file());

    let frame = compose(state, &Theme::dark(), 100, 30).unwrap();
    assert!(frame.contains("Done!"));
    assert!(frame.contains("Drafted the release notes"));
}

#[tokio::test]
async fn test_search_remote_and_local_fallback() {
    let mut f = fixture(true);
    load(&mut f.console).await;
    f.console.handle_key(key(KeyCode::Char('/')));
    type_text(&mut f.console, "refactor");
    f.console.handle_key(key(KeyCode::Enter));
    let event = next_event(&mut f.console).await;
    f.console.apply(event);
    let names: Vec<&str> = f
        .console
        .app()
        .state()
        .task_list
        .visible()
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["Refactor billing"]);

    let mut f = fixture(false);
    load(&mut f.console).await;
    f.console.handle_key(key(KeyCode::Char('/')));
    type_text(&mut f.console, "refactor");
    f.console.handle_key(key(KeyCode::Enter));
    let event = next_event(&mut f.console).await;
    f.console.apply(event);
    let state = f.console.app().state();
    // local filter also matches notes
    assert_eq!(state.task_list.visible().len(), 2);
    assert_eq!(state.task_list.cursor(), 0);
    assert!(state.status.text.contains("remote search unavailable"));
}

#[tokio::test]
async fn test_settings_editor_saves_to_file() {
    let mut f = fixture(true);
    load(&mut f.console).await;

    f.console.handle_key(key(KeyCode::Char('c')));
    assert_eq!(f.console.app().state().pane, Pane::SettingsEditor);
    // focus starts on Workspace GID ("ws")
    f.console.handle_key(key(KeyCode::Backspace));
    f.console.handle_key(key(KeyCode::Backspace));
    type_text(&mut f.console, "9001");
    f.console.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
    assert_eq!(f.console.app().state().pane, Pane::TaskBrowser);

    let event = next_event(&mut f.console).await;
    f.console.apply(event);
    assert_eq!(f.console.app().state().status.kind, StatusKind::Ok);

    let saved = f.store.load();
    assert_eq!(saved.workspace_gid, "9001");
    assert_eq!(saved.provider, "local");
}

#[tokio::test]
async fn test_quit_persists_settings() {
    let mut f = fixture(true);
    load(&mut f.console).await;
    assert!(f.console.handle_key(key(KeyCode::Char('q'))));
    f.console.persist_on_exit().await;
    assert_eq!(f.store.load().model, "tiny");
}
