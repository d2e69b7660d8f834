use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tui_textarea::Input;

use crate::app::{AppState, FocusedPanel, InputMode};

/// Lines moved per mouse wheel notch
const WHEEL_LINES: isize = 3;

pub fn handle_mouse(state: &mut AppState, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => state.scroll_by(-WHEEL_LINES),
        MouseEventKind::ScrollDown => state.scroll_by(WHEEL_LINES),
        _ => {}
    }
}

/// Handle a key event and update app state accordingly
pub fn handle_key(state: &mut AppState, key: KeyEvent) {
    // Help overlay takes priority
    if state.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            state.show_help = false;
        }
        return;
    }

    // Ctrl+C quits from anywhere
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        state.should_quit = true;
        return;
    }

    match state.mode {
        InputMode::Normal => handle_normal_mode(state, key),
        InputMode::SearchEditing => handle_search_mode(state, key),
        InputMode::Selecting => handle_selecting_mode(state, key),
    }
}

fn handle_normal_mode(state: &mut AppState, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') => state.should_quit = true,
        KeyCode::Char('?') => state.show_help = true,
        KeyCode::Char('b') => state.toggle_side_panel(),
        KeyCode::Tab => state.cycle_focus(),

        // Navigation depends on the focused panel
        KeyCode::Char('j') | KeyCode::Down => match state.focused_panel {
            FocusedPanel::LogView => state.scroll_down(),
            FocusedPanel::Sources => state.select_next_source(),
            FocusedPanel::Results => state.next_match(),
        },
        KeyCode::Char('k') | KeyCode::Up => match state.focused_panel {
            FocusedPanel::LogView => state.scroll_up(),
            FocusedPanel::Sources => state.select_prev_source(),
            FocusedPanel::Results => state.prev_match(),
        },
        KeyCode::Enter => match state.focused_panel {
            FocusedPanel::Sources => state.switch_to_selected_source(),
            FocusedPanel::Results => state.open_active_result(),
            FocusedPanel::LogView => {}
        },

        KeyCode::Char('d') if ctrl => state.scroll_page_down(),
        KeyCode::Char('u') if ctrl => state.scroll_page_up(),
        KeyCode::PageDown => state.scroll_page_down(),
        KeyCode::PageUp => state.scroll_page_up(),
        KeyCode::Char('g') | KeyCode::Home => state.go_to_top(),
        KeyCode::Char('G') | KeyCode::End => state.jump_to_latest(),

        KeyCode::Char('/') => state.start_search(),
        KeyCode::Char('n') => state.next_match(),
        KeyCode::Char('N') => state.prev_match(),
        KeyCode::Esc => {
            if state.session.search().is_active() {
                state.clear_search();
                state.status_message = Some("Search cleared".to_string());
            }
        }

        KeyCode::Char('v') => state.toggle_selection(),
        KeyCode::Char('e') => state.export(),
        KeyCode::Char('w') => state.toggle_line_wrap(),
        KeyCode::Char('c') => state.toggle_level_colors(),

        _ => {}
    }
}

fn handle_search_mode(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => state.finish_search_input(),
        KeyCode::Esc => state.clear_search(),
        _ => {
            // Forward everything else to the textarea
            if state.query_textarea.input(Input::from(key)) {
                state.query_changed();
            }
        }
    }
}

fn handle_selecting_mode(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => state.move_selection(-1),
        KeyCode::Char('y') => state.copy_selection(),
        KeyCode::Char('v') | KeyCode::Esc => state.end_selection(),
        KeyCode::Char('q') => state.should_quit = true,
        _ => {}
    }
}
