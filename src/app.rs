use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ansi_to_tui::IntoText;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use tracing::{info, warn};
use tui_textarea::TextArea;

use crate::buffer::BufferSnapshot;
use crate::config::Config;
use crate::render::RenderCommand;
use crate::search::window::SearchResults;
use crate::search::{Direction, SearchStatus};
use crate::session::{LogSession, SessionEvent};
use crate::sources::SourceSpec;
use crate::theme::Theme;

/// Detected log level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    None,
}

impl LogLevel {
    /// Detect log level from a line of text
    pub fn detect(line: &str) -> Self {
        let upper = line.to_uppercase();
        if upper.contains("ERROR") || upper.contains("[E]") || upper.contains("ERR]") {
            LogLevel::Error
        } else if upper.contains("WARN") || upper.contains("[W]") || upper.contains("WRN]") {
            LogLevel::Warn
        } else if upper.contains("INFO") || upper.contains("[I]") || upper.contains("INF]") {
            LogLevel::Info
        } else if upper.contains("DEBUG") || upper.contains("[D]") || upper.contains("DBG]") {
            LogLevel::Debug
        } else if upper.contains("TRACE") || upper.contains("[T]") || upper.contains("TRC]") {
            LogLevel::Trace
        } else {
            LogLevel::None
        }
    }

    pub fn color(&self, theme: &Theme) -> Option<Color> {
        match self {
            LogLevel::Error => Some(theme.level_error),
            LogLevel::Warn => Some(theme.level_warn),
            LogLevel::Info => Some(theme.level_info),
            LogLevel::Debug => Some(theme.level_debug),
            LogLevel::Trace => Some(theme.level_trace),
            LogLevel::None => None,
        }
    }
}

/// A single log line with its cached rendering
pub struct LogLine {
    /// The raw line as fetched (may contain ANSI codes)
    pub raw: String,
    pub level: LogLevel,
    pub has_ansi: bool,
    rendered: Option<Text<'static>>,
}

impl LogLine {
    pub fn new(raw: String) -> Self {
        let level = LogLevel::detect(&raw);
        let has_ansi = raw.contains('\x1b');
        Self {
            raw,
            level,
            has_ansi,
            rendered: None,
        }
    }

    /// Get or create the rendered text, optionally applying level coloring
    pub fn get_rendered(&mut self, theme: &Theme, apply_level_colors: bool) -> &Text<'static> {
        let (raw, level, has_ansi) = (&self.raw, self.level, self.has_ansi);
        self.rendered.get_or_insert_with(|| {
            if has_ansi {
                raw.as_bytes()
                    .into_text()
                    .unwrap_or_else(|_| Text::raw(raw.clone()))
            } else {
                match level.color(theme).filter(|_| apply_level_colors) {
                    Some(color) => Text::from(Line::from(Span::styled(
                        raw.clone(),
                        Style::default().fg(color),
                    ))),
                    None => Text::raw(raw.clone()),
                }
            }
        })
    }

    pub fn invalidate_render(&mut self) {
        self.rendered = None;
    }
}

/// Cached line renders kept before the map is flushed
const LINE_CACHE_LIMIT: usize = 4096;

/// What the renderer currently shows, updated only through `RenderCommand`s
pub struct LogView {
    pub snapshot: Arc<BufferSnapshot>,
    pub top: usize,
    pub unseen: usize,
    pub results: SearchResults,
    pub search_status: SearchStatus,
    flash: Option<(usize, Instant)>,
    flash_duration: Duration,
    lines: HashMap<usize, LogLine>,
}

impl LogView {
    pub fn new(flash_duration: Duration) -> Self {
        Self {
            snapshot: Arc::new(BufferSnapshot::default()),
            top: 0,
            unseen: 0,
            results: SearchResults::default(),
            search_status: SearchStatus::Idle,
            flash: None,
            flash_duration,
            lines: HashMap::new(),
        }
    }

    pub fn apply(&mut self, cmd: RenderCommand, now: Instant) {
        match cmd {
            RenderCommand::Render { snapshot } => {
                if snapshot.generation() != self.snapshot.generation()
                    || self.lines.len() > LINE_CACHE_LIMIT
                {
                    self.lines.clear();
                }
                self.snapshot = snapshot;
            }
            RenderCommand::ScrollToLine { line, top, flash } => {
                self.top = top;
                if flash {
                    self.flash = Some((line, now + self.flash_duration));
                }
            }
            RenderCommand::SetUnseenBadge(count) => self.unseen = count,
            RenderCommand::SetSearchResults(results) => self.results = results,
            RenderCommand::SetSearchStatus(status) => self.search_status = status,
        }
    }

    /// The flashing line, if its highlight hasn't expired
    pub fn flash_line(&self, now: Instant) -> Option<usize> {
        self.flash
            .filter(|&(_, until)| now < until)
            .map(|(line, _)| line)
    }

    /// Absolute line numbers that fit in `height` rows from the top
    pub fn visible_range(&self, height: usize) -> Range<usize> {
        let start = self.top.max(self.snapshot.first_line());
        let end = (start + height).min(self.snapshot.line_count());
        start..end.max(start)
    }

    /// The cached render state for a line, refreshed if its text grew
    pub fn log_line(&mut self, line: usize) -> Option<&mut LogLine> {
        let text = self.snapshot.line(line)?;
        let entry = self
            .lines
            .entry(line)
            .or_insert_with(|| LogLine::new(text.to_string()));
        if entry.raw != text {
            *entry = LogLine::new(text.to_string());
        }
        Some(entry)
    }

    pub fn invalidate_renders(&mut self) {
        for line in self.lines.values_mut() {
            line.invalidate_render();
        }
    }
}

/// Input mode for the application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Editing the search query
    SearchEditing,
    /// Extending a line selection
    Selecting,
}

/// Which panel has focus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusedPanel {
    LogView,
    Sources,
    Results,
}

/// A contiguous range of selected lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub cursor: usize,
}

impl Selection {
    pub fn range(&self) -> RangeInclusive<usize> {
        self.anchor.min(self.cursor)..=self.anchor.max(self.cursor)
    }

    pub fn contains(&self, line: usize) -> bool {
        self.range().contains(&line)
    }
}

/// Main application state
pub struct AppState<'a> {
    pub session: LogSession,
    pub view: LogView,
    pub theme: Theme,
    pub mode: InputMode,
    /// Search query input widget
    pub query_textarea: TextArea<'a>,
    /// Available log sources
    pub sources: Vec<SourceSpec>,
    /// Index of the displayed source
    pub current_source_idx: usize,
    /// Highlighted entry in the sources panel
    pub selected_source_idx: usize,
    pub focused_panel: FocusedPanel,
    pub show_side_panel: bool,
    pub should_quit: bool,
    pub status_message: Option<String>,
    pub show_help: bool,
    /// Whether to apply log level coloring (for lines without ANSI)
    pub level_colors_enabled: bool,
    pub line_wrap: bool,
    pub selection: Option<Selection>,
    /// Rows in the log view as of the last draw
    pub page_size: usize,
}

fn new_query_textarea<'a>(text: &str) -> TextArea<'a> {
    let mut textarea = TextArea::new(vec![text.to_string()]);
    textarea.set_cursor_line_style(Style::default());
    textarea.set_placeholder_text("type to search...");
    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
    textarea.move_cursor(tui_textarea::CursorMove::End);
    textarea
}

impl<'a> AppState<'a> {
    pub fn new(config: &Config, session: LogSession, sources: Vec<SourceSpec>) -> Self {
        Self {
            session,
            view: LogView::new(config.flash_duration()),
            theme: Theme::by_name(&config.theme),
            mode: InputMode::Normal,
            query_textarea: new_query_textarea(""),
            sources,
            current_source_idx: 0,
            selected_source_idx: 0,
            focused_panel: FocusedPanel::LogView,
            show_side_panel: true,
            should_quit: false,
            status_message: None,
            show_help: false,
            level_colors_enabled: true,
            line_wrap: false,
            selection: None,
            page_size: 1,
        }
    }

    /// Feed render commands from the session into the view
    pub fn apply(&mut self, cmds: Vec<RenderCommand>) {
        let now = Instant::now();
        for cmd in cmds {
            self.view.apply(cmd, now);
        }
    }

    pub fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Exported(Ok(path)) => {
                info!(path = %path.display(), "log exported");
                self.status_message = Some(format!("Exported to {}", path.display()));
            }
            SessionEvent::Exported(Err(e)) => {
                warn!(error = %e, "export failed");
                self.status_message = Some(format!("Export failed: {}", e));
            }
            event => {
                let cmds = self.session.handle(event);
                self.apply(cmds);
            }
        }
    }

    /// Drive the query debouncer
    pub fn tick(&mut self, now: Instant) {
        let cmds = self.session.tick(now);
        self.apply(cmds);
    }

    /// Called after each drawn frame
    pub fn after_draw(&mut self) {
        let cmds = self.session.finish_frame();
        self.apply(cmds);
    }

    pub fn set_page_size(&mut self, rows: usize) {
        self.page_size = rows.max(1);
        let cmds = self.session.set_viewport_height(self.page_size);
        self.apply(cmds);
    }

    pub fn current_source(&self) -> &SourceSpec {
        self.session.source()
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let cmds = self.session.scroll_by(delta);
        self.apply(cmds);
    }

    pub fn scroll_up(&mut self) {
        self.scroll_by(-1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_by(1);
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_by(-(self.page_size as isize));
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_by(self.page_size as isize);
    }

    pub fn go_to_top(&mut self) {
        let cmds = self.session.scroll_to_top();
        self.apply(cmds);
    }

    /// Re-render and resume following the tail
    pub fn jump_to_latest(&mut self) {
        self.end_selection();
        let cmds = self.session.jump_to_latest();
        self.apply(cmds);
    }

    /// Get the current query input text
    pub fn query_input(&self) -> String {
        self.query_textarea.lines().join("")
    }

    pub fn start_search(&mut self) {
        self.mode = InputMode::SearchEditing;
        self.focused_panel = FocusedPanel::LogView;
    }

    /// The query text changed; the debouncer decides when it commits
    pub fn query_changed(&mut self) {
        let raw = self.query_input();
        let cmds = self.session.edit_query(&raw, Instant::now());
        self.apply(cmds);
    }

    /// Leave the input, moving focus to the results if there are any
    pub fn finish_search_input(&mut self) {
        self.mode = InputMode::Normal;
        // Commit right away rather than waiting out the debounce
        if let Some(deadline) = self.session.debounce_deadline() {
            self.tick(deadline);
        }
        if self.session.search().is_active() {
            self.focused_panel = FocusedPanel::Results;
        }
    }

    pub fn clear_search(&mut self) {
        self.query_textarea = new_query_textarea("");
        let cmds = self.session.clear_query();
        self.apply(cmds);
        self.mode = InputMode::Normal;
        if self.focused_panel == FocusedPanel::Results {
            self.focused_panel = FocusedPanel::LogView;
        }
    }

    pub fn next_match(&mut self) {
        self.navigate(Direction::Next);
    }

    pub fn prev_match(&mut self) {
        self.navigate(Direction::Prev);
    }

    fn navigate(&mut self, direction: Direction) {
        if !self.session.search().is_active() {
            self.status_message = Some("No active search".to_string());
            return;
        }
        let cmds = self.session.navigate(direction);
        self.apply(cmds);
    }

    /// Jump to the active result (or the first shown) and leave search mode
    pub fn open_active_result(&mut self) {
        let target = self
            .view
            .results
            .active
            .or_else(|| self.view.results.cards.first().map(|c| c.match_index));
        let Some(match_index) = target else {
            return;
        };
        let cmds = self.session.open_result(match_index);
        self.apply(cmds);
        self.query_textarea = new_query_textarea("");
        self.focused_panel = FocusedPanel::LogView;
        if let Some((line, _)) = self.view.flash {
            self.status_message = Some(format!("Line {}", line + 1));
        }
    }

    pub fn toggle_selection(&mut self) {
        if self.selection.is_some() {
            self.end_selection();
            return;
        }
        let range = self.view.visible_range(self.page_size);
        if range.is_empty() {
            return;
        }
        let line = range.end - 1;
        self.selection = Some(Selection {
            anchor: line,
            cursor: line,
        });
        self.mode = InputMode::Selecting;
        let cmds = self.session.set_selection_active(true);
        self.apply(cmds);
    }

    pub fn end_selection(&mut self) {
        if self.selection.take().is_none() {
            return;
        }
        self.mode = InputMode::Normal;
        let cmds = self.session.set_selection_active(false);
        self.apply(cmds);
    }

    /// Move the selection's free end, scrolling to keep it visible
    pub fn move_selection(&mut self, delta: isize) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        let snapshot = &self.view.snapshot;
        if snapshot.is_empty() {
            return;
        }
        selection.cursor = selection
            .cursor
            .saturating_add_signed(delta)
            .clamp(snapshot.first_line(), snapshot.line_count() - 1);
        let cursor = selection.cursor;

        let range = self.view.visible_range(self.page_size);
        if cursor < range.start {
            self.scroll_by(cursor as isize - range.start as isize);
        } else if cursor >= range.start + self.page_size {
            self.scroll_by((cursor + 1 - range.start - self.page_size) as isize);
        }
    }

    pub fn selected_text(&self) -> Option<String> {
        let selection = self.selection?;
        let lines: Vec<&str> = selection
            .range()
            .filter_map(|n| self.view.snapshot.line(n))
            .collect();
        Some(lines.join("\n"))
    }

    /// Copy the selection to the clipboard and end it
    pub fn copy_selection(&mut self) {
        let Some(text) = self.selected_text() else {
            return;
        };
        let count = text.lines().count();
        self.status_message = Some(
            match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
                Ok(()) => format!("Copied {} lines", count),
                Err(e) => {
                    warn!(error = %e, "clipboard copy failed");
                    format!("Copy failed: {}", e)
                }
            },
        );
        self.end_selection();
    }

    pub fn select_next_source(&mut self) {
        if self.selected_source_idx + 1 < self.sources.len() {
            self.selected_source_idx += 1;
        }
    }

    pub fn select_prev_source(&mut self) {
        self.selected_source_idx = self.selected_source_idx.saturating_sub(1);
    }

    /// Display the source highlighted in the sources panel
    pub fn switch_to_selected_source(&mut self) {
        let idx = self.selected_source_idx;
        if idx == self.current_source_idx {
            return;
        }
        let Some(source) = self.sources.get(idx).cloned() else {
            return;
        };
        self.selection = None;
        self.mode = InputMode::Normal;
        match self.session.switch_source(source) {
            Ok(cmds) => {
                self.apply(cmds);
                self.current_source_idx = idx;
                self.status_message = Some(format!("Switched to {}", self.current_source().name()));
            }
            Err(e) => {
                warn!(error = %e, "cannot switch source");
                self.status_message = Some(format!("Cannot switch: {}", e));
            }
        }
    }

    pub fn export(&mut self) {
        self.session.export();
        self.status_message = Some(format!("Exporting {}...", self.current_source().name()));
    }

    pub fn toggle_level_colors(&mut self) {
        self.level_colors_enabled = !self.level_colors_enabled;
        self.view.invalidate_renders();
        self.status_message = Some(format!(
            "Level colors: {}",
            if self.level_colors_enabled { "on" } else { "off" }
        ));
    }

    pub fn toggle_line_wrap(&mut self) {
        self.line_wrap = !self.line_wrap;
        self.status_message = Some(format!(
            "Line wrap: {}",
            if self.line_wrap { "on" } else { "off" }
        ));
    }

    pub fn toggle_side_panel(&mut self) {
        self.show_side_panel = !self.show_side_panel;
        if !self.show_side_panel && self.focused_panel == FocusedPanel::Sources {
            self.focused_panel = FocusedPanel::LogView;
        }
    }

    /// Cycle focus between panels, skipping hidden ones
    pub fn cycle_focus(&mut self) {
        let searching = self.session.search().is_active();
        self.focused_panel = match self.focused_panel {
            FocusedPanel::LogView if self.show_side_panel => FocusedPanel::Sources,
            FocusedPanel::LogView | FocusedPanel::Sources if searching => FocusedPanel::Results,
            _ => FocusedPanel::LogView,
        };
    }
}
