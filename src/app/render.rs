use std::io;
use std::sync::Arc;

use crossterm::terminal;

use crate::model::AppView;
use crate::view::{Line, Presenter, Span, Tone};

use super::App;

pub fn render(app: &mut App) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    let (cols, rows) = (cols as usize, rows as usize);
    let snapshot = Arc::clone(&app.sync.snapshot);

    let mut lines = Presenter::header(&app.nav.view, &app.nav.scope, &snapshot, cols);
    let body_height = rows.saturating_sub(lines.len() + 1);

    let body = match &app.nav.view {
        AppView::Tree(name) => {
            if app.tree_lines.is_empty() {
                let hint = if app.sync.is_ready() && snapshot.app(name).is_none() {
                    format!("  {} no longer exists (Esc to go back)", name)
                } else {
                    format!("  Loading resource tree of {}...", name)
                };
                vec![Line::new(vec![Span::new(hint, Tone::Muted)])]
            } else {
                Presenter::tree(&app.tree_lines, app.tree_view.selected(), body_height)
            }
        }
        _ => {
            let hint = if app.sync.is_ready() { "(nothing in scope)" } else { "(waiting for applications)" };
            Presenter::list(&app.entries, app.nav.selected, body_height, hint)
        }
    };
    lines.extend(body.into_iter().take(body_height));
    while lines.len() + 1 < rows {
        lines.push(Line::blank());
    }
    lines.push(footer(app));

    app.screen = Presenter::draw(&lines, &app.selection)?;
    Ok(())
}

/// Bottom row: search prompt, then any status message, then key hints.
fn footer(app: &App) -> Line {
    if let Some(ref query) = app.search {
        return Line::new(vec![Span::new(" /", Tone::Accent), Span::plain(format!("{}▏", query))]);
    }
    if let Some(ref msg) = app.sync.status_message {
        let tone = if app.sync.bootstrap_failed { Tone::Bad } else { Tone::Accent };
        return Line::new(vec![Span::new(format!(" {}", msg), tone)]);
    }
    if let Some(ref msg) = app.status_message {
        return Line::new(vec![Span::new(format!(" {}", msg), Tone::Accent)]);
    }

    let hints = match app.nav.view {
        AppView::Tree(_) => {
            let mut hints = format!(
                " ↑↓ move  ←→ fold  E/C all  s/S sort [{}]  / search",
                app.tree_view.sort().label()
            );
            if !app.tree_view.filter().is_empty() {
                hints.push_str("  n/N next/prev");
            }
            hints.push_str("  ^s sync  R refresh  esc back  q quit");
            hints
        }
        AppView::Apps => format!(
            " ↑↓ move  enter open  s/S sort [{}]  ^s sync  R refresh  esc back  q quit",
            app.nav.app_sort.label()
        ),
        AppView::Clusters => " ↑↓ move  enter open  a appsets  drag copy  q quit".to_string(),
        AppView::ApplicationSets => " ↑↓ move  enter open  a clusters  drag copy  q quit".to_string(),
        _ => " ↑↓ move  enter open  esc back  a appsets  drag copy  q quit".to_string(),
    };
    Line::new(vec![Span::new(hints, Tone::Muted)])
}
