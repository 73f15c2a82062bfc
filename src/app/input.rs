use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use tracing::warn;

use crate::argocd::AppAction;
use crate::model::AppView;
use crate::selection::Position;

use super::App;

/// Result of handling a key: Quit the app, or key was consumed (needs render).
/// None means the key was not handled.
pub enum InputResult {
    Quit,
    Consumed,
}

/// Handle a key event. Returns Some(Quit) to exit, Some(Consumed) if key was handled and
/// a render is needed, None if the key was not handled.
pub fn handle_key(app: &mut App, key_event: KeyEvent) -> Option<InputResult> {
    let KeyEvent { code, modifiers, kind, .. } = key_event;
    if kind == KeyEventKind::Release {
        return None;
    }
    app.status_message = None;

    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Some(InputResult::Quit);
    }

    if app.search.is_some() {
        return handle_search(app, code);
    }

    if code == KeyCode::Char('s') && modifiers.contains(KeyModifiers::CONTROL) {
        return run_action(app, AppAction::Sync);
    }

    match code {
        KeyCode::Char('q') => return Some(InputResult::Quit),
        KeyCode::Char('y') => return yank(app),
        KeyCode::Char('R') => return run_action(app, AppAction::Refresh),
        KeyCode::Char('r') if app.sync.retry() => return Some(InputResult::Consumed),
        KeyCode::Esc if app.selection.has_content => {
            app.selection.clear();
            return Some(InputResult::Consumed);
        }
        _ => {}
    }

    let result = match &app.nav.view {
        AppView::Tree(_) => handle_tree(app, code),
        _ => handle_list(app, code),
    };
    if result.is_some() {
        app.refresh();
    }
    result
}

fn handle_list(app: &mut App, code: KeyCode) -> Option<InputResult> {
    match code {
        KeyCode::Up | KeyCode::Char('k') => {
            if app.nav.move_up() {
                return Some(InputResult::Consumed);
            }
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.nav.move_down(app.entries.len()) {
                return Some(InputResult::Consumed);
            }
        }
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
            if app.nav.enter(&app.entries) {
                return Some(InputResult::Consumed);
            }
        }
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => {
            if app.nav.back() {
                return Some(InputResult::Consumed);
            }
        }
        KeyCode::Char('a') => {
            if app.nav.toggle_top() {
                return Some(InputResult::Consumed);
            }
        }
        KeyCode::Char('s') if app.nav.view == AppView::Apps => {
            let sort = app.nav.app_sort;
            app.nav.app_sort.field = sort.field.next();
            return Some(InputResult::Consumed);
        }
        KeyCode::Char('S') if app.nav.view == AppView::Apps => {
            let sort = app.nav.app_sort;
            app.nav.app_sort.direction = sort.direction.toggle();
            return Some(InputResult::Consumed);
        }
        _ => {}
    }
    None
}

/// Ask the server to sync or refresh the application under the cursor.
fn run_action(app: &mut App, action: AppAction) -> Option<InputResult> {
    let name = app.nav.selected_app(&app.entries)?.to_string();
    app.status_message = Some(app.sync.run_action(action, &name));
    Some(InputResult::Consumed)
}

fn handle_tree(app: &mut App, code: KeyCode) -> Option<InputResult> {
    let lines = &app.tree_lines;
    let changed = match code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.tree_view.move_up(lines);
            true
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.tree_view.move_down(lines);
            true
        }
        KeyCode::Right | KeyCode::Char('l') => app.tree_view.expand_selected(lines),
        KeyCode::Left | KeyCode::Char('h') => app.tree_view.collapse_or_parent(lines),
        KeyCode::Enter | KeyCode::Char(' ') => match app.tree_view.selected_key(lines) {
            Some(key) => {
                let key = key.clone();
                app.tree_view.toggle(key);
                true
            }
            None => false,
        },
        KeyCode::Char('E') => {
            app.tree_view.expand_all();
            true
        }
        KeyCode::Char('C') => {
            let snapshot = std::sync::Arc::clone(&app.sync.snapshot);
            if let AppView::Tree(name) = &app.nav.view {
                if let Some(tree) = snapshot.tree(name) {
                    app.tree_view.collapse_all(&[tree]);
                }
            }
            true
        }
        KeyCode::Char('s') => {
            let sort = app.tree_view.sort();
            app.tree_view.set_sort(sort.field.next(), sort.direction);
            true
        }
        KeyCode::Char('S') => {
            let sort = app.tree_view.sort();
            app.tree_view.set_sort(sort.field, sort.direction.toggle());
            true
        }
        KeyCode::Char('/') => {
            app.search = Some(String::new());
            true
        }
        KeyCode::Char('n') => app.tree_view.next_match(lines),
        KeyCode::Char('N') => app.tree_view.prev_match(lines),
        KeyCode::Esc | KeyCode::Backspace => app.nav.back(),
        _ => false,
    };
    changed.then_some(InputResult::Consumed)
}

fn handle_search(app: &mut App, code: KeyCode) -> Option<InputResult> {
    let Some(ref mut query) = app.search else { return None };
    match code {
        KeyCode::Char(c) => query.push(c),
        KeyCode::Backspace => {
            query.pop();
        }
        KeyCode::Enter => {
            let query = query.clone();
            app.search = None;
            app.tree_view.set_filter(&query);
            if !app.tree_view.next_match(&app.tree_lines) && !query.trim().is_empty() {
                app.status_message = Some(format!("No match for \"{}\"", query.trim()));
            }
        }
        KeyCode::Esc => app.search = None,
        _ => return None,
    }
    Some(InputResult::Consumed)
}

/// Mouse drag selects screen text; releasing copies it.
pub fn handle_mouse(app: &mut App, event: MouseEvent) -> Option<InputResult> {
    let pos = Position::new(event.row as usize, event.column as usize);
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            app.selection.set_start(pos);
            Some(InputResult::Consumed)
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            app.selection.set_end(pos);
            Some(InputResult::Consumed)
        }
        MouseEventKind::Up(MouseButton::Left) => {
            app.selection.set_end(pos);
            if app.selection.finalize() {
                yank(app)
            } else {
                Some(InputResult::Consumed)
            }
        }
        _ => None,
    }
}

/// Copy the selected screen text to the clipboard.
fn yank(app: &mut App) -> Option<InputResult> {
    if !app.selection.has_content {
        return None;
    }
    let text = app.selection.extract_text(&app.screen);
    let chars = text.chars().count();
    let message = match app.clipboard.set(&text) {
        Ok(()) => format!("Copied {} chars", chars),
        Err(e) => {
            warn!(error = %e, "clipboard copy failed");
            format!("Copy failed: {}", e)
        }
    };
    app.status_message = Some(message);
    Some(InputResult::Consumed)
}
