use std::time::Instant;

use crate::application::{App, AppMode, Focus, PromptKind};
use crate::infrastructure::{ClipboardService, FileRepository};
use crossterm::event::{KeyCode, KeyModifiers};

pub struct InputHandler;

impl InputHandler {
    pub fn handle_key_event(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        match app.mode {
            AppMode::Library => Self::handle_library_mode(app, key, modifiers),
            AppMode::Builder => Self::handle_builder_mode(app, key, modifiers),
            AppMode::Practice => Self::handle_practice_mode(app, key),
            AppMode::Help => Self::handle_help_mode(app, key),
            AppMode::Prompt(_) => Self::handle_prompt_mode(app, key),
            AppMode::ConfirmDelete => Self::handle_confirm_mode(app, key),
        }
    }

    /// Shortcuts shared by the library and the builder. Returns true when
    /// the key was used.
    fn handle_shared_shortcuts(app: &mut App, key: KeyCode, modifiers: KeyModifiers) -> bool {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('o') => app.start_import_file(),
                KeyCode::Char('v') => app.start_share_import(ClipboardService::paste().ok()),
                KeyCode::Char('y') => {
                    let result = app
                        .share_code()
                        .and_then(|code| ClipboardService::copy(&code).map(|_| code));
                    app.set_share_copy_result(result);
                }
                KeyCode::Char('e') => app.start_export_file(),
                KeyCode::Char('w') => app.start_csv_export(),
                _ => return false,
            }
            return true;
        }
        match key {
            KeyCode::F(1) | KeyCode::Char('?') => app.open_help(),
            KeyCode::Char('p') => app.start_practice(Instant::now()),
            _ => return false,
        }
        true
    }

    fn handle_library_mode(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        app.status_message = None;
        if Self::handle_shared_shortcuts(app, key, modifiers) {
            return;
        }
        match key {
            KeyCode::Up | KeyCode::Char('k') => app.library_move(-1),
            KeyCode::Down | KeyCode::Char('j') => app.library_move(1),
            KeyCode::Enter => app.open_selected(),
            KeyCode::Char('n') => app.new_flow(),
            KeyCode::Char('d') | KeyCode::Delete => app.start_delete(),
            KeyCode::Char('q') => {
                // Will be handled by main loop
            }
            _ => {}
        }
    }

    fn handle_builder_mode(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        if app.is_grabbing() {
            Self::handle_grab(app, key);
            return;
        }

        if modifiers.contains(KeyModifiers::CONTROL) && key == KeyCode::Char('s') {
            app.save_current();
            return;
        }
        app.status_message = None;
        if Self::handle_shared_shortcuts(app, key, modifiers) {
            return;
        }

        match key {
            KeyCode::Tab | KeyCode::BackTab => {
                app.toggle_focus();
                return;
            }
            KeyCode::Esc => {
                app.close_session();
                return;
            }
            KeyCode::Char('/') => {
                app.start_search();
                return;
            }
            KeyCode::Char('n') => {
                app.start_rename_flow();
                return;
            }
            KeyCode::Char('i') => {
                app.start_edit_description();
                return;
            }
            KeyCode::Char('o') => {
                app.toggle_sort();
                return;
            }
            _ => {}
        }

        match app.focus {
            Focus::Catalog => Self::handle_catalog_pane(app, key),
            Focus::Flow => Self::handle_flow_pane(app, key),
        }
    }

    fn handle_catalog_pane(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => app.catalog_move(-1),
            KeyCode::Down | KeyCode::Char('j') => app.catalog_move(1),
            KeyCode::PageUp => app.catalog_move(-10),
            KeyCode::PageDown => app.catalog_move(10),
            KeyCode::Enter | KeyCode::Char('a') => app.add_selected_catalog_pose(),
            _ => {}
        }
    }

    fn handle_flow_pane(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => app.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => app.move_cursor(1),
            KeyCode::PageUp => app.move_cursor(-10),
            KeyCode::PageDown => app.move_cursor(10),
            KeyCode::Char('K') => app.nudge_current(true),
            KeyCode::Char('J') => app.nudge_current(false),
            KeyCode::Char('m') => app.grab_current(),
            KeyCode::Char(' ') => app.toggle_selected_current(),
            KeyCode::Char('g') => app.start_group(),
            KeyCode::Char('u') => app.ungroup_current(),
            KeyCode::Char('c') | KeyCode::Enter => app.toggle_collapse_current(),
            KeyCode::Char('r') => app.start_rename_section(),
            KeyCode::Char('x') => app.delete_current_section(),
            KeyCode::Char('d') | KeyCode::Delete => app.remove_current(),
            KeyCode::Char('D') => app.remove_selected(),
            KeyCode::Char('y') => app.duplicate_current(),
            KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_duration(1),
            KeyCode::Char('-') => app.adjust_duration(-1),
            KeyCode::Char('t') => app.start_duration_prompt(),
            KeyCode::Char('s') => app.cycle_side_current(),
            KeyCode::Char('a') => {
                app.focus = Focus::Catalog;
            }
            _ => {}
        }
    }

    fn handle_grab(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => app.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => app.move_cursor(1),
            KeyCode::PageUp => app.move_cursor(-10),
            KeyCode::PageDown => app.move_cursor(10),
            KeyCode::Enter | KeyCode::Char('m') => app.drop_grabbed(false),
            KeyCode::End => app.drop_grabbed(true),
            KeyCode::Esc => app.cancel_grab(),
            _ => {}
        }
    }

    fn handle_practice_mode(app: &mut App, key: KeyCode) {
        let now = Instant::now();
        match key {
            KeyCode::Char(' ') => app.practice_toggle_pause(now),
            KeyCode::Right | KeyCode::Char('n') => app.practice_next(now),
            KeyCode::Left | KeyCode::Char('b') => app.practice_previous(now),
            KeyCode::Char('e') => app.practice_end(),
            KeyCode::Esc | KeyCode::Char('q') => app.cancel_practice(),
            _ => {}
        }
    }

    fn handle_help_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => {
                app.close_help();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if app.help_scroll > 0 {
                    app.help_scroll -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::PageUp => {
                app.help_scroll = app.help_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                app.help_scroll += 5;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }

    fn handle_confirm_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_delete(),
            _ => {}
        }
    }

    fn handle_prompt_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Enter => Self::submit_prompt(app),
            KeyCode::Esc => {
                app.cancel_prompt();
            }
            KeyCode::Backspace => {
                if app.cursor_position > 0 {
                    let previous = prev_char_boundary(&app.input, app.cursor_position);
                    app.input.replace_range(previous..app.cursor_position, "");
                    app.cursor_position = previous;
                }
            }
            KeyCode::Delete => {
                if app.cursor_position < app.input.len() {
                    let next = next_char_boundary(&app.input, app.cursor_position);
                    app.input.replace_range(app.cursor_position..next, "");
                }
            }
            KeyCode::Left => {
                if app.cursor_position > 0 {
                    app.cursor_position = prev_char_boundary(&app.input, app.cursor_position);
                }
            }
            KeyCode::Right => {
                if app.cursor_position < app.input.len() {
                    app.cursor_position = next_char_boundary(&app.input, app.cursor_position);
                }
            }
            KeyCode::Home => {
                app.cursor_position = 0;
            }
            KeyCode::End => {
                app.cursor_position = app.input.len();
            }
            KeyCode::Char(c) => {
                app.input.insert(app.cursor_position, c);
                app.cursor_position += c.len_utf8();
            }
            _ => {}
        }
    }

    fn submit_prompt(app: &mut App) {
        let AppMode::Prompt(kind) = app.mode.clone() else {
            return;
        };
        match kind {
            PromptKind::ImportFile => {
                let filename = app.prompt_filename();
                let result = FileRepository::import_flow(&filename, &app.catalog);
                app.set_import_result(result);
            }
            PromptKind::ExportFile => {
                let filename = app.prompt_filename();
                let result = match app.export_flow() {
                    Some(flow) => FileRepository::export_flow(flow, &filename),
                    None => Err("No flow to export".to_string()),
                };
                app.set_export_result(result);
            }
            PromptKind::ExportCsv => {
                let filename = app.prompt_filename();
                let result = match app.export_flow() {
                    Some(flow) => FileRepository::export_csv(flow, &filename),
                    None => Err("No flow to export".to_string()),
                };
                app.set_csv_export_result(result);
            }
            _ => app.finish_prompt(),
        }
    }
}

fn prev_char_boundary(text: &str, index: usize) -> usize {
    text[..index]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn next_char_boundary(text: &str, index: usize) -> usize {
    text[index..]
        .chars()
        .next()
        .map(|c| index + c.len_utf8())
        .unwrap_or(index)
}
