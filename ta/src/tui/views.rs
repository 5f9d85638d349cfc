//! TUI views and rendering
//!
//! All rendering logic is contained here. The views read an [`AppState`]
//! snapshot and a [`Theme`] and never modify state, so the same snapshot
//! and terminal size always produce the same frame.

use eyre::Result;
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use tracing::trace;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::settings_editor::{FieldKey, FieldKind, SettingsEditor};
use super::state::{AppState, Pane, Severity, StatusKind, SwitcherFocus};
use super::theme::Theme;

/// Smallest terminal the main layout is drawn in
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 10;

const RESIZE_NOTICE: &str = "Terminal too small — please resize!";

/// Header, status line and keybind line
const CHROME_ROWS: u16 = 3;

/// Top and bottom border of a panel
const BORDER_ROWS: u16 = 2;

/// Widest the settings card gets
const SETTINGS_CARD_WIDTH: u16 = 72;

/// Screen chosen for one render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    ResizeNotice,
    Search,
    Settings,
    Main,
}

impl Screen {
    pub fn select(state: &AppState, area: Rect) -> Self {
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            Self::ResizeNotice
        } else if state.settings_editor.is_some() {
            Self::Settings
        } else if state.searching {
            Self::Search
        } else {
            Self::Main
        }
    }
}

/// Rows of the task list panel for a terminal `height`
pub fn list_rows(height: u16) -> usize {
    body_height(height).saturating_sub(BORDER_ROWS) as usize
}

/// Rows of the execution log panel for a terminal `height`
pub fn log_rows(height: u16) -> usize {
    body_height(height).saturating_sub(BORDER_ROWS) as usize
}

fn body_height(height: u16) -> u16 {
    height.saturating_sub(CHROME_ROWS)
}

/// Main render function
pub fn render(state: &AppState, theme: &Theme, frame: &mut Frame) {
    let area = frame.area();
    let screen = Screen::select(state, area);
    trace!(?screen, width = area.width, height = area.height, "render: called");

    match screen {
        Screen::ResizeNotice => render_resize_notice(theme, frame, area),
        Screen::Search => render_search_overlay(state, theme, frame, area),
        Screen::Settings => {
            if let Some(editor) = &state.settings_editor {
                render_settings_editor(editor, state, theme, frame, area);
            }
        }
        Screen::Main => render_main(state, theme, frame, area),
    }
}

/// Render a snapshot off-screen and return the frame as text
///
/// One line per terminal row; the trailing cells covered by wide
/// characters are skipped so each row reads as displayed.
pub fn compose(state: &AppState, theme: &Theme, width: u16, height: u16) -> Result<String> {
    trace!(width, height, "compose: called");
    let mut terminal = Terminal::new(TestBackend::new(width, height))?;
    terminal.draw(|frame| render(state, theme, frame))?;

    let buffer = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..buffer.area.height {
        let mut skip = 0;
        for x in 0..buffer.area.width {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            let symbol = buffer[(x, y)].symbol();
            skip = symbol.width().saturating_sub(1);
            out.push_str(symbol);
        }
        out.push('\n');
    }
    Ok(out)
}

fn render_resize_notice(theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!("render_resize_notice: called");
    let mut lines = vec![Line::default(); (area.height / 2) as usize];
    lines.push(Line::from(Span::styled(
        truncate_display(RESIZE_NOTICE, area.width as usize),
        Style::default().fg(theme.loading).add_modifier(Modifier::BOLD),
    )));
    let notice = Paragraph::new(pad_lines(lines, area.height as usize)).alignment(Alignment::Center);
    frame.render_widget(notice, area);
}

fn render_main(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!(?state.pane, "render_main: called");
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Status
            Constraint::Length(1), // Keybinds
        ])
        .split(area);

    render_header(state, theme, frame, chunks[0]);
    render_body(state, theme, frame, chunks[1]);
    render_status_line(state, theme, frame, chunks[2]);
    render_keybinds(theme, frame, chunks[3]);
}

fn render_header(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!("render_header: called");
    let provider = state
        .active_provider()
        .map(|p| p.name.as_str())
        .unwrap_or(state.settings.provider.as_str());

    let mut spans = vec![
        Span::styled(
            " ⚡ task-agent",
            Style::default().fg(theme.header).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{} / {}", provider, state.settings.model),
            Style::default().fg(theme.text),
        ),
        Span::styled(format!("  [{}]", state.pane.display_name()), Style::default().fg(theme.dim)),
    ];
    if state.loading || state.execution_in_flight {
        spans.push(Span::styled(
            format!("  {}", state.spinner()),
            Style::default().fg(theme.loading),
        ));
    }

    frame.render_widget(Paragraph::new(fit_line(spans, area.width as usize)), area);
}

fn render_body(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    let list_width = area.width * 42 / 100;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(list_width), Constraint::Min(0)])
        .split(area);

    render_task_list(state, theme, frame, columns[0]);

    if state.pane == Pane::ExecutionLog {
        render_execution_log(state, theme, frame, columns[1]);
        return;
    }

    let detail_height = columns[1].height * 60 / 100;
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(detail_height), Constraint::Min(0)])
        .split(columns[1]);

    render_detail(state, theme, frame, right[0]);
    render_model_switcher(state, theme, frame, right[1]);
}

fn panel<'a>(title: String, focused: bool, theme: &Theme) -> Block<'a> {
    let color = if focused { theme.border_focused } else { theme.border };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(color))
}

fn render_task_list(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!("render_task_list: called");
    let list = &state.task_list;
    let focused = state.pane == Pane::TaskBrowser;

    let mut title = format!(" Tasks ({}) ", list.visible().len());
    if let Some(filter) = list.filter() {
        title = format!(" Tasks ({}) /{} ", list.visible().len(), filter);
    }
    let rows = area.height.saturating_sub(BORDER_ROWS) as usize;
    if let Some(percent) = list.scroll_percent(rows) {
        title.push_str(&format!("↕ {}% ", percent));
    }
    let block = panel(truncate_display(&title, area.width.saturating_sub(2) as usize), focused, theme);

    let inner = block.inner(area);
    let width = inner.width as usize;
    let height = inner.height as usize;

    if list.is_empty() {
        frame.render_widget(block, area);
        let message = if state.loading {
            "Loading…"
        } else if list.filter().is_some() {
            "No matching tasks (Esc clears the filter)"
        } else {
            "No tasks — press r to refresh"
        };
        render_empty_message(theme, frame, area, message);
        return;
    }

    let lines: Vec<Line> = list
        .window(height)
        .map(|(index, item)| {
            let row = format!(" {} {} {}", item.status_icon(), item.priority.icon(), item.name);
            let row = truncate_display(&row, width);
            if index == list.cursor() {
                let color = if focused { theme.border_focused } else { theme.text };
                let fill = width.saturating_sub(row.width());
                Line::from(Span::styled(
                    format!("{}{}", row, " ".repeat(fill)),
                    Style::default()
                        .fg(color)
                        .bg(theme.selected_bg)
                        .add_modifier(Modifier::BOLD),
                ))
            } else if item.completed {
                Line::from(Span::styled(row, Style::default().fg(theme.dim)))
            } else {
                Line::from(Span::styled(row, Style::default().fg(theme.text)))
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(pad_lines(lines, height)).block(block), area);
}

fn render_detail(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!("render_detail: called");
    let block = panel(" Task Details ".to_string(), false, theme);
    let inner = block.inner(area);
    let width = inner.width as usize;
    let height = inner.height as usize;

    let Some(item) = state.task_list.selected() else {
        frame.render_widget(block, area);
        render_empty_message(theme, frame, area, "Select a task");
        return;
    };

    let label = Style::default().fg(theme.dim);
    let value = Style::default().fg(theme.text);
    let kv = |key: &str, val: String| {
        fit_line(
            vec![
                Span::styled(format!(" {:<10}", key), label),
                Span::styled(val, value),
            ],
            width,
        )
    };

    let mut lines = vec![
        fit_line(
            vec![Span::styled(
                format!(" {}", item.name),
                Style::default().fg(theme.header).add_modifier(Modifier::BOLD),
            )],
            width,
        ),
        Line::default(),
        kv("ID", item.id.clone()),
        kv("Status", format!("{} {}", item.status_icon(), item.status_label())),
    ];
    if item.priority.is_set() {
        lines.push(kv("Priority", format!("{} {}", item.priority.icon(), item.priority)));
    }
    if let Some(due) = item.due {
        lines.push(kv("Due", due.format("%Y-%m-%d").to_string()));
    }
    if let Some(assignee) = &item.assignee {
        lines.push(kv("Assignee", assignee.clone()));
    }
    if !item.labels.is_empty() {
        let labels: Vec<&str> = item.labels.iter().map(String::as_str).collect();
        lines.push(kv("Tags", labels.join(", ")));
    }
    if !item.notes.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(" Description", label)));
        for row in wrap_words(&item.notes, width.saturating_sub(2)) {
            lines.push(Line::from(Span::styled(format!("  {}", row), value)));
        }
    }

    frame.render_widget(Paragraph::new(pad_lines(lines, height)).block(block), area);
}

fn render_model_switcher(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!("render_model_switcher: called");
    let focus = match state.pane {
        Pane::ModelSwitcher(focus) => Some(focus),
        _ => None,
    };
    let title = match focus {
        Some(SwitcherFocus::Models) => " Model › Models ",
        _ => " Model › Providers ",
    };
    let block = panel(title.to_string(), focus.is_some(), theme);
    let inner = block.inner(area);
    let width = inner.width as usize;
    let height = inner.height as usize;

    let row = |label: String, cursor: bool, current: bool| {
        let marker = if current { "▶ " } else { "  " };
        let text = truncate_display(&format!(" {}{}", marker, label), width);
        let style = if cursor {
            Style::default()
                .fg(theme.border_focused)
                .bg(theme.selected_bg)
                .add_modifier(Modifier::BOLD)
        } else if current {
            Style::default().fg(theme.ok)
        } else {
            Style::default().fg(theme.text)
        };
        Line::from(Span::styled(text, style))
    };

    let mut lines = Vec::new();
    if focus == Some(SwitcherFocus::Models) {
        if let Some(provider) = state.switcher_provider() {
            lines.push(fit_line(
                vec![Span::styled(format!(" {}", provider.name), Style::default().fg(theme.dim))],
                width,
            ));
            let is_active_provider = provider.id == state.settings.provider;
            for (i, model) in provider.models.iter().enumerate() {
                lines.push(row(
                    model.clone(),
                    i == state.switcher.model,
                    is_active_provider && *model == state.settings.model,
                ));
            }
        }
    } else {
        for (i, provider) in state.registry.all().iter().enumerate() {
            lines.push(row(
                provider.name.clone(),
                focus.is_some() && i == state.switcher.provider,
                provider.id == state.settings.provider,
            ));
        }
    }

    // Keep the model cursor on screen for long model lists
    let skip = match focus {
        Some(SwitcherFocus::Models) => (state.switcher.model + 2).saturating_sub(height),
        _ => (state.switcher.provider + 1).saturating_sub(height),
    };
    let lines: Vec<Line> = lines.into_iter().skip(skip).collect();

    frame.render_widget(Paragraph::new(pad_lines(lines, height)).block(block), area);
}

fn render_execution_log(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!("render_execution_log: called");
    let mut title = " Execution Log ".to_string();
    if state.execution_in_flight {
        title = format!(" Execution Log {} Working… ", state.spinner());
    } else if state.log_scroll.is_some() {
        title = " Execution Log [scrolled] ".to_string();
    }
    let block = panel(truncate_display(&title, area.width.saturating_sub(2) as usize), true, theme);
    let inner = block.inner(area);
    let width = inner.width as usize;
    let height = inner.height as usize;

    let all = state.log_lines();
    if all.is_empty() {
        frame.render_widget(block, area);
        render_empty_message(theme, frame, area, "No execution yet. Select a task and press Enter.");
        return;
    }

    let lines: Vec<Line> = all
        .iter()
        .skip(state.log_offset(height))
        .take(height)
        .map(|line| {
            let color = match line.severity {
                Severity::Info => theme.text,
                Severity::Dim => theme.progress,
                Severity::Ok => theme.ok,
                Severity::Error => theme.error,
            };
            Line::from(Span::styled(truncate_display(&line.text, width), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(Paragraph::new(pad_lines(lines, height)).block(block), area);
}

fn render_status_line(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!(?state.status.kind, "render_status_line: called");
    let color = match state.status.kind {
        StatusKind::Ok => theme.ok,
        StatusKind::Error => theme.error,
        StatusKind::Loading => theme.loading,
        StatusKind::Neutral => theme.text,
    };
    let text = if state.status.kind == StatusKind::Loading && (state.loading || state.execution_in_flight) {
        format!(" {} {}", state.spinner(), state.status.text)
    } else {
        format!(" {}", state.status.text)
    };
    let status = Paragraph::new(Line::from(Span::styled(
        truncate_display(&text, area.width as usize),
        Style::default().fg(color),
    )));
    frame.render_widget(status, area);
}

fn render_keybinds(theme: &Theme, frame: &mut Frame, area: Rect) {
    let binds = [
        ("↑↓/jk", "nav"),
        ("Enter", "execute"),
        ("Tab", "pane"),
        ("/", "search"),
        ("c", "config"),
        ("l", "log"),
        ("r", "refresh"),
        ("q", "quit"),
    ];
    let mut spans = vec![Span::raw(" ")];
    for (i, (key, desc)) in binds.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" · ", Style::default().fg(theme.dim)));
        }
        spans.push(Span::styled(*key, Style::default().fg(theme.keybind)));
        spans.push(Span::styled(format!(" {}", desc), Style::default().fg(theme.dim)));
    }
    frame.render_widget(Paragraph::new(fit_line(spans, area.width as usize)), area);
}

fn render_search_overlay(state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!(query = %state.search_input, "render_search_overlay: called");
    let top = area.height.saturating_sub(3) / 2;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(top), Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    let input_area = rows[1].inner(Margin {
        horizontal: 2,
        vertical: 0,
    });

    let block = panel(" Search tasks ".to_string(), true, theme);
    let width = block.inner(input_area).width as usize;
    let line = fit_line(
        vec![
            Span::styled("/ ", Style::default().fg(theme.keybind).add_modifier(Modifier::BOLD)),
            Span::styled(state.search_input.clone(), Style::default().fg(theme.text)),
            Span::styled("▌", Style::default().fg(theme.border_focused)),
            Span::styled("   Enter=search · Esc=cancel", Style::default().fg(theme.dim)),
        ],
        width,
    );

    frame.render_widget(Paragraph::new(pad_lines(Vec::new(), area.height as usize)), area);
    frame.render_widget(Paragraph::new(line).block(block), input_area);
}

fn render_settings_editor(editor: &SettingsEditor, state: &AppState, theme: &Theme, frame: &mut Frame, area: Rect) {
    trace!(focus = editor.focus(), "render_settings_editor: called");
    let card_width = area.width.saturating_sub(4).min(SETTINGS_CARD_WIDTH);
    let pad = (area.width - card_width) / 2;
    let card = Rect {
        x: area.x + pad,
        y: area.y + 1,
        width: card_width,
        height: area.height.saturating_sub(2),
    };

    let block = panel(" 🔧 Configuration ".to_string(), true, theme);
    let inner = block.inner(card);
    let width = inner.width as usize;
    let height = inner.height as usize;

    let dim = Style::default().fg(theme.dim);
    let mut lines = vec![
        fit_line(
            vec![Span::styled(
                " Tab/Shift-Tab navigate · Enter save field · ←→ pick · Ctrl-S save & close · Esc cancel",
                dim,
            )],
            width,
        ),
        Line::default(),
    ];

    let mut focus_line = 0;
    for (i, field) in editor.fields().iter().enumerate() {
        let focused = i == editor.focus();
        if focused {
            focus_line = lines.len();
            lines.push(fit_line(
                vec![Span::styled(
                    format!(" › {}", field.label),
                    Style::default().fg(theme.header).add_modifier(Modifier::BOLD),
                )],
                width,
            ));
        } else {
            lines.push(fit_line(vec![Span::styled(format!("   {}", field.label), dim)], width));
        }

        let mut value = vec![Span::raw("     ")];
        match &field.kind {
            FieldKind::Choice { options, selected } => {
                for (j, option) in options.iter().enumerate() {
                    if j == *selected {
                        value.push(Span::styled(
                            format!("[ {} ]", option),
                            Style::default().fg(theme.loading).add_modifier(Modifier::BOLD),
                        ));
                    } else {
                        value.push(Span::styled(format!("  {}  ", option), dim));
                    }
                    value.push(Span::raw(" "));
                }
            }
            FieldKind::Text { .. } => {
                let shown = field.display_value();
                if shown.is_empty() && !focused {
                    value.push(Span::styled("(not set)", dim));
                } else {
                    value.push(Span::styled(shown, Style::default().fg(theme.text)));
                }
                if focused {
                    value.push(Span::styled("▌", Style::default().fg(theme.border_focused)));
                }
            }
        }
        lines.push(fit_line(value, width));
        lines.push(Line::default());
    }

    let chosen = editor.field(&FieldKey::Provider).map(|field| field.value());
    if let Some(provider) = chosen.and_then(|id| state.registry.get(id)) {
        lines.push(fit_line(
            vec![Span::styled(
                format!(" Available models for {}: {}", provider.name, provider.models.join(", ")),
                dim,
            )],
            width,
        ));
    }

    // Scroll just enough to keep the focused label and its value visible
    let skip = (focus_line + 2).saturating_sub(height);
    let lines: Vec<Line> = lines.into_iter().skip(skip).collect();

    frame.render_widget(Paragraph::new(pad_lines(Vec::new(), area.height as usize)), area);
    frame.render_widget(Paragraph::new(pad_lines(lines, height)).block(block), card);
}

/// Render empty state message
fn render_empty_message(theme: &Theme, frame: &mut Frame, area: Rect, message: &str) {
    trace!(%message, "render_empty_message: called");
    let inner = area.inner(Margin {
        horizontal: 2,
        vertical: 2,
    });

    let empty = Paragraph::new(truncate_display(message, inner.width as usize))
        .style(Style::default().fg(theme.dim))
        .alignment(Alignment::Center);

    frame.render_widget(empty, inner);
}

/// Pad or cut `lines` to exactly `height` rows
fn pad_lines(mut lines: Vec<Line<'_>>, height: usize) -> Vec<Line<'_>> {
    lines.truncate(height);
    lines.resize(height, Line::default());
    lines
}

/// Cut `s` to at most `width` display columns, ending in `…` when cut
///
/// Never splits a character; a wide character that does not fit is dropped.
pub fn truncate_display(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = take_width(s, width - 1);
    out.push('…');
    out
}

/// Longest prefix of `s` that fits in `width` columns
fn take_width(s: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Truncate a styled line to `width` columns, keeping span styles
fn fit_line(spans: Vec<Span<'_>>, width: usize) -> Line<'_> {
    let total: usize = spans.iter().map(|s| s.content.width()).sum();
    if total <= width {
        return Line::from(spans);
    }
    if width == 0 {
        return Line::default();
    }

    let mut remaining = width - 1;
    let mut style = Style::default();
    let mut out = Vec::new();
    for span in spans {
        style = span.style;
        let w = span.content.width();
        if w <= remaining {
            remaining -= w;
            out.push(span);
        } else {
            out.push(Span::styled(take_width(&span.content, remaining), span.style));
            break;
        }
    }
    out.push(Span::styled("…", style));
    Line::from(out)
}

/// Greedy word wrap by display width; over-long words are truncated
fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    if width == 0 {
        return rows;
    }
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if line.is_empty() { word.width() } else { line.width() + 1 + word.width() };
            if needed > width && !line.is_empty() {
                rows.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
            if line.width() > width {
                rows.push(truncate_display(&line, width));
                line.clear();
            }
        }
        rows.push(line);
    }
    rows
}
