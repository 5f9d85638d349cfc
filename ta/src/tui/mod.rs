//! Terminal console for task-agent
//!
//! A two-column dashboard showing:
//! - the task list with search (/) and refresh (r)
//! - task details and the provider/model switcher
//! - a live execution log while a task runs
//! - a full-screen settings editor (c)

pub mod app;
pub mod events;
pub mod execution;
pub mod runner;
pub mod settings_editor;
pub mod state;
pub mod task_list;
pub mod theme;
pub mod views;

pub use app::App;
pub use events::{Event, EventHandler};
pub use execution::{ExecutionController, ExecutionError, ExecutionMessage, ExecutionRequest};
pub use runner::{Collaborators, Console, ConsoleEvent, TuiRunner};
pub use state::{AppState, Pane};
pub use theme::Theme;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use eyre::Result;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::info;

use crate::config::Settings;
use crate::providers::ProviderRegistry;

/// Spinner and redraw interval
const TICK_RATE: Duration = Duration::from_millis(100);

/// Terminal type alias
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode
pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
pub fn restore() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

/// Run the console until the user quits
pub async fn run(settings: Settings, registry: Arc<ProviderRegistry>, collaborators: Collaborators) -> Result<()> {
    info!(provider = %settings.provider, model = %settings.model, "Starting console");
    let terminal = init()?;

    // Use a guard to ensure terminal is restored even on early return/error
    struct TerminalGuard;
    impl Drop for TerminalGuard {
        fn drop(&mut self) {
            let _ = restore();
        }
    }
    let _guard = TerminalGuard;

    let console = Console::new(settings, registry, collaborators);
    let mut runner = TuiRunner::new(terminal, console, EventHandler::new(TICK_RATE));
    runner.run().await
}
