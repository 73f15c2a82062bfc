pub mod frame;
mod header;
mod lists;
mod shared;
pub mod tree;

use std::io::{self, Write};
use crossterm::{execute, cursor, queue, style::{Color, SetForegroundColor, ResetColor}, terminal};

use crate::app::ListEntry;
use crate::model::{AppView, Scope};
use crate::selection::Selection;
use crate::sync::Snapshot;

pub use frame::{Line, Span, Tone};
pub use shared::{fit, truncate_str, visible_window};
pub use tree::{NodeKey, TreeLine, TreeView};

pub struct Presenter;

/// Minimum terminal dimensions for usable rendering.
pub const MIN_COLS: u16 = 80;
pub const MIN_ROWS: u16 = 10;

impl Presenter {
    /// Check if the terminal is large enough. If not, render a "too small"
    /// message and return `true` (meaning "skip normal rendering").
    pub fn render_size_guard() -> io::Result<bool> {
        let (cols, rows) = terminal::size()?;
        if !Self::fits(cols, rows) {
            let mut out = std::io::stdout();
            execute!(out, terminal::Clear(terminal::ClearType::All), cursor::MoveTo(0, 0))?;
            let msg = Self::too_small_message(cols, rows);
            let y = rows / 2;
            let x = cols.saturating_sub(msg.len() as u16) / 2;
            queue!(out, cursor::MoveTo(x, y), SetForegroundColor(Color::Yellow))?;
            write!(out, "{}", msg)?;
            queue!(out, ResetColor)?;
            out.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn fits(cols: u16, rows: u16) -> bool {
        cols >= MIN_COLS && rows >= MIN_ROWS
    }

    pub fn too_small_message(cols: u16, rows: u16) -> String {
        format!(
            "Terminal too small ({}x{}). Resize to at least {}x{}.",
            cols, rows, MIN_COLS, MIN_ROWS
        )
    }

    pub fn header(view: &AppView, scope: &Scope, snapshot: &Snapshot, cols: usize) -> Vec<Line> {
        header::header_lines(view, scope, snapshot, cols)
    }

    pub fn list(entries: &[ListEntry], selected: usize, height: usize, empty_hint: &str) -> Vec<Line> {
        lists::list_lines(entries, selected, height, empty_hint)
    }

    /// Tree rows scrolled to keep the cursor visible, cursor row highlighted.
    pub fn tree(lines: &[TreeLine], selected: usize, height: usize) -> Vec<Line> {
        let (start, end) = visible_window(selected, lines.len(), height);
        lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let mut line = Line::new(vec![Span::plain("  ")]);
                line.spans.extend(l.line.spans.iter().cloned());
                line.highlight(start + i == selected)
            })
            .collect()
    }

    /// Draw a full frame to stdout. Returns the plain text of each drawn row.
    pub fn draw(lines: &[Line], selection: &Selection) -> io::Result<Vec<String>> {
        let mut out = io::stdout();
        frame::draw(&mut out, lines, selection)
    }
}
