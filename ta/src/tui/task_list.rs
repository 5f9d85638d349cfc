//! Task list controller
//!
//! Owns the fetched item set, the visible (filtered) view of it, and the
//! cursor/scroll position over the visible items.
//!
//! Invariants:
//! - when `visible` is non-empty, `cursor < visible.len()`
//! - when `visible` is empty, `cursor == 0 && scroll_offset == 0`
//! - `scroll_offset <= cursor < scroll_offset + viewport`

use tracing::debug;

use crate::domain::WorkItem;

/// Working set, filtered view and selection
#[derive(Debug, Clone)]
pub struct TaskList {
    items: Vec<WorkItem>,
    visible: Vec<WorkItem>,
    filter: Option<String>,
    cursor: usize,
    scroll_offset: usize,
    viewport: usize,
}

impl Default for TaskList {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            visible: Vec::new(),
            filter: None,
            cursor: 0,
            scroll_offset: 0,
            viewport: 1,
        }
    }
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working set and clear any filter
    pub fn load(&mut self, items: Vec<WorkItem>) {
        debug!(count = items.len(), "TaskList::load: called");
        self.visible = items.clone();
        self.items = items;
        self.filter = None;
        self.reset_position();
    }

    /// Show a search result set for `query`; an empty query shows everything
    pub fn apply_filter(&mut self, query: &str, results: Vec<WorkItem>) {
        debug!(%query, count = results.len(), "TaskList::apply_filter: called");
        if query.trim().is_empty() {
            self.show_all();
            return;
        }
        self.visible = results;
        self.filter = Some(query.trim().to_string());
        self.reset_position();
    }

    /// Drop the filter and show the full working set
    pub fn show_all(&mut self) {
        debug!("TaskList::show_all: called");
        self.visible = self.items.clone();
        self.filter = None;
        self.reset_position();
    }

    /// Move the cursor by `delta`, clamped to the visible items
    ///
    /// Scrolls only when the cursor leaves the viewport, by the minimum
    /// amount needed to bring it back.
    pub fn move_cursor(&mut self, delta: isize) {
        debug!(delta, cursor = self.cursor, "TaskList::move_cursor: called");
        if self.visible.is_empty() {
            return;
        }
        let last = self.visible.len() - 1;
        let target = if delta.is_negative() {
            self.cursor.saturating_sub(delta.unsigned_abs())
        } else {
            self.cursor.saturating_add(delta.unsigned_abs()).min(last)
        };
        self.cursor = target;
        self.keep_cursor_visible();
    }

    /// Set the number of rows the list can show
    pub fn set_viewport(&mut self, rows: usize) {
        debug!(rows, "TaskList::set_viewport: called");
        self.viewport = rows.max(1);
        self.keep_cursor_visible();
    }

    fn keep_cursor_visible(&mut self) {
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + self.viewport {
            self.scroll_offset = self.cursor + 1 - self.viewport;
        }
    }

    fn reset_position(&mut self) {
        self.cursor = 0;
        self.scroll_offset = 0;
    }

    /// Item under the cursor
    pub fn selected(&self) -> Option<&WorkItem> {
        self.visible.get(self.cursor)
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn visible(&self) -> &[WorkItem] {
        &self.visible
    }

    /// First row shown when the panel has `rows` rows
    ///
    /// Starts from the stored offset and moves only as far as needed to keep
    /// the cursor on screen without blank rows below the last item.
    pub fn offset_for(&self, rows: usize) -> usize {
        let rows = rows.max(1);
        let mut offset = self.scroll_offset;
        if self.cursor < offset {
            offset = self.cursor;
        } else if self.cursor >= offset + rows {
            offset = self.cursor + 1 - rows;
        }
        offset.min(self.visible.len().saturating_sub(rows))
    }

    /// Items that fit in `rows` rows, with their absolute index
    pub fn window(&self, rows: usize) -> impl Iterator<Item = (usize, &WorkItem)> {
        self.visible.iter().enumerate().skip(self.offset_for(rows)).take(rows)
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Scroll position as a percentage, if the list overflows `rows` rows
    pub fn scroll_percent(&self, rows: usize) -> Option<usize> {
        let len = self.visible.len();
        let rows = rows.max(1);
        if len <= rows {
            return None;
        }
        Some(self.offset_for(rows) * 100 / (len - rows))
    }
}
