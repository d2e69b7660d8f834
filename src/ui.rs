use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar,
        ScrollbarOrientation, ScrollbarState, Wrap,
    },
};

use crate::app::{AppState, FocusedPanel, InputMode};
use crate::search::SearchStatus;
use crate::search::window::Segment;
use crate::theme::Theme;
use crate::viewport::ViewMode;

const SIDE_PANEL_WIDTH: u16 = 24;

/// Draw the entire UI
pub fn draw(frame: &mut Frame, state: &mut AppState) {
    let main_chunks = if state.show_side_panel {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDE_PANEL_WIDTH), Constraint::Min(20)])
            .split(frame.area())
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20)])
            .split(frame.area())
    };

    if state.show_side_panel {
        draw_sources_panel(frame, state, main_chunks[0]);
    }

    let content_area = if state.show_side_panel {
        main_chunks[1]
    } else {
        main_chunks[0]
    };

    // The results panel only takes space while a search is active
    let results_height = if state.session.search().is_active() {
        Constraint::Percentage(40)
    } else {
        Constraint::Length(0)
    };

    let content_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Log view
            results_height,        // Search results
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Query bar
        ])
        .split(content_area);

    draw_header(frame, state, content_chunks[0]);
    draw_log_view(frame, state, content_chunks[1]);
    if content_chunks[2].height > 0 {
        draw_results_panel(frame, state, content_chunks[2]);
    }
    draw_status_bar(frame, state, content_chunks[3]);
    draw_query_bar(frame, state, content_chunks[4]);

    if state.show_help {
        draw_help_overlay(frame, &state.theme);
    }
}

fn border_style(theme: &Theme, focused: bool) -> Style {
    Style::default().fg(if focused {
        theme.border_focused
    } else {
        theme.border_unfocused
    })
}

fn draw_sources_panel(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let block = Block::default()
        .title(" Sources ")
        .borders(Borders::ALL)
        .border_style(border_style(theme, state.focused_panel == FocusedPanel::Sources));

    let items: Vec<ListItem> = state
        .sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let prefix = if i == state.current_source_idx { "▶ " } else { "  " };
            let style = if i == state.selected_source_idx && state.focused_panel == FocusedPanel::Sources {
                Style::default().fg(theme.source_selected).add_modifier(Modifier::BOLD)
            } else if i == state.current_source_idx {
                Style::default().fg(theme.source_current)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}", prefix, source.name())).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn draw_header(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " hound ",
            Style::default().fg(theme.header_title).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(state.current_source().name(), Style::default().fg(theme.header_source)),
    ]))
    .style(Style::default().bg(theme.header_bg));

    frame.render_widget(header, area);
}

/// Spans for a line with search matches
fn segment_spans(segments: &[Segment], theme: &Theme, active: bool) -> Vec<Span<'static>> {
    let match_style = if active {
        Style::default()
            .bg(theme.active_match_bg)
            .fg(theme.active_match_fg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(theme.match_bg).fg(theme.match_fg)
    };
    segments
        .iter()
        .flat_map(|segment| {
            if segment.matched {
                vec![Span::styled(segment.text.clone(), match_style)]
            } else {
                plain_spans(&segment.text)
            }
        })
        .collect()
}

/// Unmatched text keeps its ANSI styling
fn plain_spans(text: &str) -> Vec<Span<'static>> {
    if !text.contains('\x1b') {
        return vec![Span::raw(text.to_string())];
    }
    use ansi_to_tui::IntoText;
    match text.as_bytes().into_text() {
        Ok(parsed) => parsed.lines.into_iter().flat_map(|l| l.spans).collect(),
        Err(_) => vec![Span::raw(text.to_string())],
    }
}

fn draw_log_view(frame: &mut Frame, state: &mut AppState, area: Rect) {
    let focused = state.focused_panel == FocusedPanel::LogView;
    let block = Block::default()
        .borders(if state.show_side_panel { Borders::LEFT } else { Borders::NONE })
        .border_style(border_style(&state.theme, focused && state.show_side_panel));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let height = inner.height as usize;
    if height == 0 {
        return;
    }
    if height != state.page_size {
        state.set_page_size(height);
    }

    let now = Instant::now();
    let snapshot = state.view.snapshot.clone();
    let range = state.view.visible_range(height);
    let flash_line = state.view.flash_line(now);
    let active_line = state.session.search().active_line();
    let gutter = snapshot.line_count().max(1).to_string().len();
    let theme = &state.theme;

    let mut lines: Vec<Line<'static>> = Vec::with_capacity(height);
    for n in range.clone() {
        let number = Span::styled(
            format!("{:>width$} ", n + 1, width = gutter),
            Style::default().fg(theme.line_number),
        );
        let mut spans = vec![number];
        match state.session.segments_for_line(&snapshot, n) {
            Some(segments) => {
                spans.extend(segment_spans(&segments, theme, active_line == Some(n)));
            }
            None => {
                if let Some(line) = state.view.log_line(n) {
                    let rendered = line.get_rendered(theme, state.level_colors_enabled);
                    spans.extend(rendered.lines.iter().flat_map(|l| l.spans.iter().cloned()));
                }
            }
        }

        let mut line = Line::from(spans);
        if state.selection.is_some_and(|s| s.contains(n)) {
            line = line.style(Style::default().bg(theme.selection_bg));
        } else if flash_line == Some(n) {
            line = line.style(Style::default().bg(theme.flash_bg));
        }
        lines.push(line);
    }

    let mut paragraph = Paragraph::new(Text::from(lines));
    if state.line_wrap {
        paragraph = paragraph.wrap(Wrap { trim: false });
    }
    frame.render_widget(paragraph, inner);

    let retained = snapshot.line_count() - snapshot.first_line();
    if retained > height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(retained.saturating_sub(height))
            .position(range.start - snapshot.first_line());
        frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }

    if snapshot.is_empty() {
        let msg = Paragraph::new("Waiting for log lines...")
            .style(Style::default().fg(theme.empty_state));
        frame.render_widget(msg, inner);
    }

    if state.view.unseen > 0 {
        let label = format!(" ↓ {} new lines (G) ", state.view.unseen);
        let width = (label.chars().count() as u16).min(inner.width);
        let badge_area = Rect::new(
            inner.x + inner.width - width,
            inner.y + inner.height - 1,
            width,
            1,
        );
        let badge = Paragraph::new(label)
            .alignment(Alignment::Right)
            .style(Style::default().bg(theme.badge_bg).fg(theme.badge_fg));
        frame.render_widget(Clear, badge_area);
        frame.render_widget(badge, badge_area);
    }
}

fn draw_results_panel(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let results = &state.view.results;
    let title = match state.view.search_status {
        SearchStatus::Scanning => " Results (searching...) ".to_string(),
        _ if results.total_lines == 0 => " Results: no matches ".to_string(),
        _ => format!(
            " Results {}-{} of {} lines, {} matches ",
            results.window.start + 1,
            results.window.end,
            results.total_lines,
            results.total_matches
        ),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(theme, state.focused_panel == FocusedPanel::Results));

    let gutter = results
        .cards
        .last()
        .map(|c| (c.line + 1).to_string().len())
        .unwrap_or(1)
        + 2;

    let items: Vec<ListItem> = results
        .cards
        .iter()
        .map(|card| {
            let mut lines = Vec::with_capacity(card.snippet.len() + 1);
            let marker = if card.active { "▶" } else { " " };
            lines.push(Line::from(Span::styled(
                format!("{} #{} line {}", marker, card.match_index + 1, card.line + 1),
                Style::default().fg(theme.header_source).add_modifier(Modifier::BOLD),
            )));
            for snippet in &card.snippet {
                let mut spans = vec![Span::styled(
                    format!("{:>width$} ", snippet.line + 1, width = gutter),
                    Style::default().fg(theme.line_number),
                )];
                spans.extend(segment_spans(
                    &snippet.segments,
                    theme,
                    card.active && snippet.is_match_line,
                ));
                let mut line = Line::from(spans);
                if !snippet.is_match_line {
                    line = line.style(Style::default().add_modifier(Modifier::DIM));
                }
                lines.push(line);
            }
            ListItem::new(Text::from(lines))
        })
        .collect();

    let mut list_state = ListState::default();
    if let Some(active) = results.active {
        list_state.select(active.checked_sub(results.window.start));
    }
    frame.render_stateful_widget(List::new(items).block(block), area, &mut list_state);
}

fn draw_status_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let snapshot = &state.view.snapshot;
    let stats = state.session.stats();

    let mode_str = match state.mode {
        InputMode::Normal => "NORMAL",
        InputMode::SearchEditing => "SEARCH",
        InputMode::Selecting => "SELECT",
    };
    let view_str = match state.session.viewport().mode() {
        ViewMode::Tailing => "[TAIL]",
        ViewMode::Paused => "[PAUSED]",
        ViewMode::Jumping { .. } => "[JUMP]",
    };
    let wrap_indicator = if state.line_wrap { " [W]" } else { "" };
    let color_indicator = if state.level_colors_enabled { " [C]" } else { "" };

    let search_str = match state.view.search_status {
        SearchStatus::Idle => String::new(),
        SearchStatus::Scanning => " | searching...".to_string(),
        SearchStatus::Ready => match state.view.results.active {
            Some(active) => format!(
                " | match {}/{} lines",
                active + 1,
                state.view.results.total_lines
            ),
            None => format!(" | {} matches", state.view.results.total_matches),
        },
    };

    let poll_span = if stats.is_stale() {
        Span::styled(
            format!(" fetch failing ({}x) ", stats.consecutive_failures),
            Style::default().fg(theme.status_stale).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            format!(" polls {}/{} ", stats.successes, stats.successes + stats.failures),
            Style::default().fg(theme.status_help),
        )
    };

    let help_text = match state.mode {
        InputMode::SearchEditing => " Enter:results  Esc:clear ",
        InputMode::Selecting => " j/k:extend  y:copy  Esc:cancel ",
        InputMode::Normal => " ?:help  /:search  G:latest ",
    };

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_str),
            Style::default().bg(theme.status_mode_bg).fg(theme.status_mode_fg),
        ),
        Span::raw(format!(
            " {} {} lines{}{}{} ",
            view_str,
            snapshot.line_count(),
            wrap_indicator,
            color_indicator,
            search_str
        )),
        poll_span,
        Span::styled(help_text, Style::default().fg(theme.status_help)),
    ]);

    frame.render_widget(
        Paragraph::new(status).style(Style::default().bg(theme.status_bg)),
        area,
    );
}

fn draw_query_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    if state.mode == InputMode::SearchEditing {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(area);

        frame.render_widget(
            Paragraph::new("/").style(Style::default().fg(theme.warning_message)),
            chunks[0],
        );
        frame.render_widget(&state.query_textarea, chunks[1]);
        return;
    }

    let content = if let Some(msg) = &state.status_message {
        Line::from(Span::styled(msg.as_str(), Style::default().fg(theme.warning_message)))
    } else if state.session.search().is_active() {
        Line::from(Span::styled(
            format!("/{}", state.session.search().term()),
            Style::default().fg(theme.empty_state),
        ))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(content), area);
}

fn draw_help_overlay(frame: &mut Frame, theme: &Theme) {
    let area = frame.area();

    let width = 52.min(area.width.saturating_sub(4));
    let height = 30.min(area.height.saturating_sub(4));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);

    let help_text = vec![
        Line::from(Span::styled("Keyboard Shortcuts", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  j/k, ↑/↓       Scroll up/down"),
        Line::from("  Ctrl+d/u       Page down/up"),
        Line::from("  g              Go to top (pauses)"),
        Line::from("  G              Jump to latest (tails)"),
        Line::from(""),
        Line::from("Search:"),
        Line::from("  /              Edit search (live)"),
        Line::from("  Enter          Focus results"),
        Line::from("  n/N            Next/previous match"),
        Line::from("  Enter (result) Open result, end search"),
        Line::from("  Esc            Clear search"),
        Line::from(""),
        Line::from("Selection:"),
        Line::from("  v              Start/stop selection"),
        Line::from("  y              Copy selected lines"),
        Line::from(""),
        Line::from("Display:"),
        Line::from("  Tab            Cycle panel focus"),
        Line::from("  Enter (source) Switch source"),
        Line::from("  e              Export log"),
        Line::from("  w / c          Toggle wrap / level colors"),
        Line::from("  b              Toggle side panel"),
        Line::from("  ?              Toggle this help"),
        Line::from("  q              Quit"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.help_border))
        .style(Style::default().bg(theme.help_bg));

    frame.render_widget(Paragraph::new(help_text).block(block), help_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_segments_use_active_style() {
        let theme = Theme::default();
        let segments = vec![
            Segment {
                text: "an ".to_string(),
                matched: false,
            },
            Segment {
                text: "error".to_string(),
                matched: true,
            },
        ];
        let spans = segment_spans(&segments, &theme, true);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].style.bg, Some(theme.active_match_bg));
        let spans = segment_spans(&segments, &theme, false);
        assert_eq!(spans[1].style.bg, Some(theme.match_bg));
    }

    #[test]
    fn test_plain_spans_strip_ansi() {
        let spans = plain_spans("\x1b[32mok\x1b[0m ");
        let text: String = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "ok ");
    }
}
